use crate::app::{App, AppMode};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table},
    Frame,
};
use stint_ipc::format::{format_duration, format_time_of_day};

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(6),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(area);

    // One clock sample per frame keeps every figure on screen consistent.
    let now = app.now();

    draw_header(f, chunks[0], app);
    draw_stopwatch(f, chunks[1], app, now);
    draw_intervals(f, chunks[2], app);
    draw_status_bar(f, chunks[3], app);

    match &app.mode {
        AppMode::EditingComment(_) => draw_input_overlay(f, "Comment", &app.input_buffer, app),
        AppMode::EditingStart(_) => {
            draw_input_overlay(f, "Start time (HH:MM:SS)", &app.input_buffer, app)
        }
        AppMode::EditingEnd(_) => {
            draw_input_overlay(f, "End time (HH:MM:SS)", &app.input_buffer, app)
        }
        AppMode::ConfirmReset => draw_confirm_overlay(f, app),
        AppMode::ShowHelp => draw_help_overlay(f, app),
        AppMode::Normal => {}
    }
}

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let text = Line::from(vec![
        Span::raw(icons.header_left.clone()),
        Span::styled(
            "STINT",
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        ),
        Span::raw(icons.header_right.clone()),
    ]);
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_style(Style::default().fg(theme.black)),
        ),
        area,
    );
}

fn draw_stopwatch(f: &mut Frame, area: Rect, app: &App, now: i64) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let ledger = &app.ledger;
    let (state_icon, border_color) = if ledger.is_running() {
        (&icons.play, theme.green)
    } else {
        (&icons.pause, theme.gray)
    };
    let block = Block::default()
        .title(Span::styled(
            format!(" {} Stopwatch ", icons.stopwatch),
            Style::default().fg(theme.gray),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(border_color));
    let inner_area = block.inner(area);
    f.render_widget(block, area);
    let v_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(inner_area);
    f.render_widget(
        Paragraph::new(format!(
            "{} {}",
            state_icon,
            format_duration(ledger.total_elapsed(now))
        ))
        .style(
            Style::default()
                .fg(theme.foreground)
                .add_modifier(Modifier::BOLD),
        )
        .alignment(Alignment::Center),
        v_chunks[0],
    );
    let segment = match ledger.current_start_time() {
        Some(start) => format!(
            "current {} since {}",
            format_duration(ledger.current_segment_elapsed(now)),
            format_time_of_day(start)
        ),
        None => format!("{} intervals recorded", ledger.intervals().len()),
    };
    f.render_widget(
        Paragraph::new(segment)
            .style(Style::default().fg(theme.cyan))
            .alignment(Alignment::Center),
        v_chunks[1],
    );
}

fn draw_intervals(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let icons = &app.config.icons;
    let block = Block::default()
        .title(Span::styled(
            format!(" {} Intervals ", icons.interval_list),
            Style::default().fg(theme.gray),
        ))
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(theme.green));
    let intervals = app.ledger.intervals();
    if intervals.is_empty() {
        let inner_area = block.inner(area);
        f.render_widget(block, area);
        f.render_widget(
            Paragraph::new("No intervals yet. Press space to start.")
                .style(Style::default().fg(theme.gray))
                .alignment(Alignment::Center),
            inner_area,
        );
        return;
    }
    let header = Row::new(vec!["", "Start", "End", "Duration", "Comment"]).style(
        Style::default()
            .fg(theme.blue)
            .add_modifier(Modifier::BOLD),
    );
    let rows = intervals.iter().enumerate().map(|(i, interval)| {
        let selected = i == app.selected;
        let marker = if selected {
            Span::styled(icons.select.clone(), Style::default().fg(theme.selection))
        } else {
            Span::raw(" ")
        };
        let comment = if interval.comment.is_empty() {
            Cell::from(Span::styled("add comment…", Style::default().fg(theme.gray)))
        } else {
            Cell::from(interval.comment.clone())
        };
        let row = Row::new(vec![
            Cell::from(marker),
            Cell::from(format_time_of_day(interval.start_time)),
            Cell::from(format_time_of_day(interval.end_time)),
            Cell::from(Span::styled(
                format_duration(interval.duration),
                Style::default().fg(theme.cyan),
            )),
            comment,
        ])
        .style(Style::default().fg(theme.foreground));
        if selected {
            row.style(Style::default().fg(theme.foreground).bg(theme.black))
        } else {
            row
        }
    });
    let widths = [
        Constraint::Length(2),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Length(10),
        Constraint::Min(10),
    ];
    f.render_widget(
        Table::new(rows, widths)
            .header(header)
            .column_spacing(1)
            .block(block),
        area,
    );
}

fn draw_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let theme = &app.config.theme;
    let (mode_text, mode_color) = match app.mode {
        AppMode::Normal if app.ledger.is_running() => ("RUNNING", theme.green),
        AppMode::Normal => ("IDLE", theme.gray),
        AppMode::EditingComment(_) => ("COMMENT", theme.yellow),
        AppMode::EditingStart(_) | AppMode::EditingEnd(_) => ("TIME", theme.blue),
        AppMode::ConfirmReset => ("RESET", theme.red),
        AppMode::ShowHelp => ("HELP", theme.magenta),
    };
    let sep = &app.config.icons.separator;
    let help = match (&app.message, &app.mode) {
        (Some(message), _) => Span::styled(message.clone(), Style::default().fg(theme.red)),
        (None, AppMode::Normal) => Span::raw(format!(
            "space:start/pause {sep} c:comment {sep} s/e:edit time {sep} d:del {sep} r:reset {sep} ?:help {sep} q:quit"
        )),
        (None, AppMode::ConfirmReset) => Span::raw("y:confirm │ n/esc:cancel"),
        (None, AppMode::ShowHelp) => Span::raw("esc/?:close"),
        (None, _) => Span::raw("enter:confirm │ esc:cancel"),
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(
                format!(" {} ", mode_text),
                Style::default()
                    .bg(mode_color)
                    .fg(theme.background)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::raw(" "),
            help,
        ]))
        .block(Block::default().style(Style::default().bg(theme.black).fg(theme.gray))),
        area,
    );
}

fn draw_input_overlay(f: &mut Frame, title: &str, input: &str, app: &App) {
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(format!(" {} ", title))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(app.config.theme.yellow))
        .border_type(BorderType::Double)
        .style(Style::default().bg(app.config.theme.background));
    let inner_area = block.inner(area);
    f.render_widget(block, area);
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled("▸ ", Style::default().fg(app.config.theme.foreground)),
            Span::styled(input, Style::default().fg(app.config.theme.foreground)),
            Span::styled(
                &app.config.icons.input_cursor,
                Style::default()
                    .fg(app.config.theme.foreground)
                    .add_modifier(Modifier::SLOW_BLINK),
            ),
        ])),
        inner_area,
    );
}

fn draw_confirm_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, area);
    let count = app.ledger.intervals().len();
    let text = vec![
        Line::from(format!("Discard {} recorded interval(s)?", count)),
        Line::from(Span::styled(
            "y to reset, n to keep",
            Style::default().fg(theme.gray),
        )),
    ];
    f.render_widget(
        Paragraph::new(text).alignment(Alignment::Center).block(
            Block::default()
                .title(" Reset ")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .border_style(Style::default().fg(theme.red))
                .style(Style::default().bg(theme.background)),
        ),
        area,
    );
}

fn draw_help_overlay(f: &mut Frame, app: &App) {
    let theme = &app.config.theme;
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);

    let shortcuts = [
        ("General", vec![("q", "Quit"), ("?", "Toggle help")]),
        (
            "Timer",
            vec![("Space", "Start/pause"), ("r", "Reset all intervals")],
        ),
        (
            "Intervals",
            vec![
                ("c", "Edit comment"),
                ("s", "Edit start time"),
                ("e", "Edit end time"),
                ("d", "Delete interval"),
                ("j/↓", "Move down"),
                ("k/↑", "Move up"),
            ],
        ),
    ];

    let mut lines = Vec::new();
    for (section, keys) in shortcuts {
        lines.push(Line::from(Span::styled(
            section,
            Style::default().fg(theme.blue).add_modifier(Modifier::BOLD),
        )));
        for (key, action) in keys {
            lines.push(Line::from(vec![
                Span::styled(format!("  {:<6}", key), Style::default().fg(theme.selection)),
                Span::raw(action),
            ]));
        }
        lines.push(Line::from(""));
    }

    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .title(" Help ")
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .border_style(Style::default().fg(theme.magenta))
                .style(Style::default().bg(theme.background)),
        ),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::app_at;
    use ratatui::{backend::TestBackend, Terminal};

    fn render(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn shows_running_total_and_intervals() {
        let (mut app, clock, _) = app_at(0);
        app.toggle_timer();
        clock.advance(65_000);
        app.toggle_timer();
        app.ledger.update_comment(1, "planning").unwrap();
        app.toggle_timer();
        clock.advance(5_000);

        let screen = render(&app);

        assert!(screen.contains("00:01:10"));
        assert!(screen.contains("00:01:05"));
        assert!(screen.contains("planning"));
        assert!(screen.contains("RUNNING"));
    }

    #[test]
    fn empty_ledger_shows_hint() {
        let (app, _, _) = app_at(0);
        assert!(render(&app).contains("No intervals yet"));
    }

    #[test]
    fn status_bar_shows_last_error() {
        let (mut app, _, _) = app_at(0);
        app.message = Some("failed to persist timer state".to_string());
        assert!(render(&app).contains("failed to persist timer state"));
    }

    #[test]
    fn overlays_render_for_modal_modes() {
        let (mut app, clock, _) = app_at(0);
        app.toggle_timer();
        clock.advance(1_000);
        app.toggle_timer();

        app.request_reset();
        assert!(render(&app).contains("Discard 1 recorded interval(s)?"));

        app.confirm_reset(false);
        app.mode = AppMode::ShowHelp;
        assert!(render(&app).contains("Edit start time"));
    }
}
