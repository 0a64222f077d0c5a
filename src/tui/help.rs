use ratatui::{
    layout::Rect,
    style::Color,
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

fn key_line(keys: &[&'static str], action: &'static str) -> Line<'static> {
    let mut spans = vec![Span::raw("  ")];
    let mut width = 0;
    for (i, k) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" / "));
            width += 3;
        }
        spans.push(Span::styled(*k, Style::default().fg(Color::Magenta)));
        width += k.chars().count();
    }
    spans.push(Span::raw(" ".repeat(14usize.saturating_sub(width))));
    spans.push(Span::raw(action));
    Line::from(spans)
}

pub fn draw_help(area: Rect, f: &mut Frame) {
    let p = Paragraph::new(vec![
        Line::from("Keybinds:"),
        key_line(&["space"], "Start / split / save prompt"),
        key_line(&["backspace", "u"], "Undo last split"),
        key_line(&["r"], "Reset the run"),
        key_line(&["y"], "Save finished run (retry after a failure)"),
        key_line(&["n"], "Discard finished run"),
        key_line(&["tab"], "Switch tabs"),
        key_line(&["?"], "Show this help"),
        key_line(&["q", "Ctrl-C"], "Quit"),
        Line::from(""),
        Line::from("Timer tab:"),
        Line::from(vec![
            Span::raw("  Deltas are "),
            Span::styled("green", Style::default().fg(Color::Green)),
            Span::raw(" when ahead of your personal best and "),
            Span::styled("red", Style::default().fg(Color::Red)),
            Span::raw(" when behind."),
        ]),
        Line::from("  Large leads are hidden while a segment is running."),
        Line::from("  Rows after the current one show the personal-best pace."),
        Line::from(""),
        Line::from("Files:"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled("--data-dir", Style::default().fg(Color::Cyan)),
            Span::raw("  holds splits.json and splitwatch.log"),
        ]),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(p, area);
}
