//! Interactive setup for picking or creating a category and route.
//!
//! Generic over the reader and writer so it can be driven from tests.

use crate::model::{Category, Route};
use crate::storage::SplitStore;
use anyhow::{bail, Context, Result};
use std::io::{BufRead, Write};
use tracing::info;

const DIVIDER: &str = "==========";

pub(crate) struct Wizard<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Wizard<R, W> {
    pub(crate) fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Walk the user to a route. `None` means they declined to save a new route.
    pub(crate) fn run(&mut self, store: &mut dyn SplitStore) -> Result<Option<Route>> {
        let categories = store.categories().context("load categories")?;
        let category = if categories.is_empty() || !self.yes_no("Use existing category?")? {
            self.new_category(store)?
        } else {
            writeln!(self.output, "Choose a category")?;
            for (i, c) in categories.iter().enumerate() {
                writeln!(self.output, "({}) {}", i + 1, c.category.name)?;
            }
            let pick = self.select(categories.len())?;
            categories[pick].category.clone()
        };

        let routes = store
            .routes_in_category(category.id)
            .context("load routes")?;
        if routes.is_empty() || !self.yes_no("Use existing route?")? {
            return self.new_route(store, &category);
        }
        writeln!(self.output, "Choose a route")?;
        for (i, r) in routes.iter().enumerate() {
            writeln!(self.output, "({}) {}", i + 1, r.name)?;
        }
        let pick = self.select(routes.len())?;
        Ok(Some(routes[pick].clone()))
    }

    fn new_category(&mut self, store: &mut dyn SplitStore) -> Result<Category> {
        loop {
            let name = self.prompt("New category name: ")?;
            match store.create_category(&name) {
                Ok(c) => {
                    info!(category = %c.name, "category created");
                    return Ok(c);
                }
                Err(e) => writeln!(self.output, "{e:#}")?,
            }
        }
    }

    fn new_route(&mut self, store: &mut dyn SplitStore, category: &Category) -> Result<Option<Route>> {
        let name = loop {
            let name = self.prompt("New route name: ")?;
            if name.is_empty() {
                continue;
            }
            // Route names are unique across categories.
            if store.find_route(&name).context("look up route")?.is_some() {
                writeln!(self.output, "route '{name}' already exists")?;
                continue;
            }
            break name;
        };

        writeln!(self.output, "{DIVIDER}")?;
        writeln!(self.output, "Input the names of each segment")?;
        writeln!(self.output, "Push enter without input to finish")?;
        writeln!(self.output)?;
        let mut segments = Vec::new();
        loop {
            let segment = self.prompt(&format!("{}.) ", segments.len() + 1))?;
            if segment.is_empty() {
                if segments.is_empty() {
                    writeln!(self.output, "A route needs at least one segment")?;
                    continue;
                }
                break;
            }
            segments.push(segment);
        }

        if !self.yes_no("Save?")? {
            return Ok(None);
        }
        let route = store
            .create_route(category.id, &name, &segments)
            .with_context(|| format!("create route '{name}'"))?;
        info!(route = %route.name, segments = route.len(), "route created");
        Ok(Some(route))
    }

    /// Ask a yes/no question until the answer is one of the two.
    pub(crate) fn yes_no(&mut self, question: &str) -> Result<bool> {
        writeln!(self.output, "{question}")?;
        loop {
            match self.prompt("(y/n) ")?.to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => {}
            }
        }
    }

    /// 1-based option pick; returns a 0-based index below `max`.
    fn select(&mut self, max: usize) -> Result<usize> {
        loop {
            if let Ok(n) = self.prompt("Option number: ")?.parse::<usize>() {
                if (1..=max).contains(&n) {
                    return Ok(n - 1);
                }
            }
        }
    }

    fn prompt(&mut self, text: &str) -> Result<String> {
        write!(self.output, "{text}")?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            bail!("input closed");
        }
        Ok(line.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::tests::temp_store;
    use std::io::Cursor;

    fn run_with(input: &str, store: &mut dyn SplitStore) -> (Result<Option<Route>>, String) {
        let mut out = Vec::new();
        let res = Wizard::new(Cursor::new(input.as_bytes()), &mut out).run(store);
        (res, String::from_utf8(out).unwrap())
    }

    #[test]
    fn creates_category_and_route_on_empty_store() {
        let (_dir, mut store) = temp_store();
        let (res, out) = run_with("Celeste\nAny%\n1A\n2A\n\ny\n", &mut store);
        let route = res.unwrap().unwrap();
        assert_eq!(route.name, "Any%");
        assert_eq!(route.segment_name(1), "2A");
        assert!(out.contains("New category name: "));
        assert!(out.contains("3.) "));
        assert_eq!(store.find_route("Any%").unwrap(), Some(route));
    }

    #[test]
    fn declining_save_creates_nothing() {
        let (_dir, mut store) = temp_store();
        let (res, _) = run_with("Celeste\nAny%\n1A\n\nn\n", &mut store);
        assert_eq!(res.unwrap(), None);
        assert!(store.find_route("Any%").unwrap().is_none());
    }

    #[test]
    fn picks_existing_category_and_route() {
        let (_dir, mut store) = temp_store();
        store.create_category("Celeste").unwrap();
        let c = store.create_category("Portal").unwrap();
        let r = store
            .create_route(c.id, "Inbounds", &["00".into(), "01".into()])
            .unwrap();

        // Invalid answers are asked again.
        let (res, out) = run_with("maybe\ny\n7\n2\ny\n1\n", &mut store);
        assert_eq!(res.unwrap(), Some(r));
        assert!(out.contains("(2) Portal"));
        assert!(out.contains("(1) Inbounds"));
    }

    #[test]
    fn taken_route_name_is_asked_again() {
        let (_dir, mut store) = temp_store();
        let celeste = store.create_category("Celeste").unwrap();
        store
            .create_route(celeste.id, "Any%", &["1A".into()])
            .unwrap();
        store.create_category("Portal").unwrap();

        // Existing category Portal, which has no routes yet.
        let (res, out) = run_with("y\n2\nAny%\nInbounds\n00\n01\n\ny\n", &mut store);
        let route = res.unwrap().unwrap();
        assert_eq!(route.name, "Inbounds");
        assert_eq!(route.len(), 2);
        assert!(out.contains("route 'Any%' already exists"));
        assert_eq!(store.routes_in_category(celeste.id).unwrap().len(), 1);
    }

    #[test]
    fn route_needs_a_segment() {
        let (_dir, mut store) = temp_store();
        let (res, out) = run_with("Celeste\nAny%\n\n1A\n\ny\n", &mut store);
        assert_eq!(res.unwrap().unwrap().len(), 1);
        assert!(out.contains("at least one segment"));
    }

    #[test]
    fn closed_input_is_an_error() {
        let (_dir, mut store) = temp_store();
        let (res, _) = run_with("Celeste\n", &mut store);
        assert!(res.unwrap_err().to_string().contains("input closed"));
    }
}
