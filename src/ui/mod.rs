//! Screen rendering
//!
//! Pure drawing: every function takes the frame and a read-only view of the
//! application state. Nothing here mutates state or talks to the OS.

use crate::app::state::{
    AppState, Screen, PART_FIELD_EFI, PART_FIELD_FORMAT_EFI, PART_FIELD_SEED, PART_FIELD_SPROUT,
};
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Frame;

fn title_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn focused_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn label_style() -> Style {
    Style::default().fg(Color::Gray)
}

fn error_style() -> Style {
    Style::default().fg(Color::Red)
}

/// Draw the current screen.
pub fn draw(frame: &mut Frame, state: &AppState) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(3),
    ])
    .split(frame.area());

    draw_header(frame, state, chunks[0]);
    match state.screen {
        Screen::DiskSelect => draw_disk_select(frame, state, chunks[1]),
        Screen::PartitionSelect => draw_partition_select(frame, state, chunks[1]),
        Screen::SystemConfig => draw_system_config(frame, state, chunks[1]),
        Screen::Packages => draw_packages(frame, state, chunks[1]),
        Screen::Summary => draw_summary(frame, state, chunks[1]),
        Screen::Installing => draw_installing(frame, state, chunks[1]),
    }
    draw_status(frame, state, chunks[2]);
}

fn draw_header(frame: &mut Frame, state: &AppState, area: Rect) {
    let mut title = format!("Seedling :: {}", state.screen);
    if state.dry_run {
        title.push_str("  [DRY RUN]");
    }
    let header = Paragraph::new(Line::styled(title, title_style()))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn draw_status(frame: &mut Frame, state: &AppState, area: Rect) {
    let text = if state.status_message.is_empty() {
        Line::styled(hint_for(state.screen), label_style())
    } else {
        Line::styled(state.status_message.clone(), error_style())
    };
    let status = Paragraph::new(text).block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, area);
}

fn hint_for(screen: Screen) -> &'static str {
    match screen {
        Screen::DiskSelect => "↑/↓ select disk · Enter choose · q quit",
        Screen::PartitionSelect => "↑/↓ row · ←/→ change partition · Enter next · Esc back",
        Screen::SystemConfig => "type to edit · Tab next field · Enter continue · Esc back",
        Screen::Packages => "edit the space-separated package list · Enter continue · Esc back",
        Screen::Summary => "Enter start installation · Esc back · q quit",
        Screen::Installing => "↑/↓ scroll log",
    }
}

fn draw_disk_select(frame: &mut Frame, state: &AppState, area: Rect) {
    let items: Vec<ListItem> = state
        .disks
        .iter()
        .map(|disk| ListItem::new(disk.display()))
        .collect();
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Available storage disks"),
        )
        .highlight_style(focused_style())
        .highlight_symbol("> ");

    let mut list_state = ListState::default();
    list_state.select(Some(state.disk_cursor));
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_partition_select(frame: &mut Frame, state: &AppState, area: Rect) {
    let row = |label: &str, value: String, focused: bool| {
        Line::from(vec![
            Span::styled(format!("{label:<34}"), label_style()),
            Span::styled(value, if focused { focused_style() } else { Style::default() }),
        ])
    };

    let partition_value = |role: usize| {
        state
            .partition_for(role)
            .map(|p| p.display())
            .unwrap_or_else(|| "<none>".to_string())
    };

    let lines = vec![
        Line::raw(""),
        row(
            "Seed partition (read-only base):",
            partition_value(PART_FIELD_SEED),
            state.partition_field == PART_FIELD_SEED,
        ),
        Line::raw(""),
        row(
            "Sprout partition (writable layer):",
            partition_value(PART_FIELD_SPROUT),
            state.partition_field == PART_FIELD_SPROUT,
        ),
        Line::raw(""),
        row(
            "EFI partition (boot):",
            partition_value(PART_FIELD_EFI),
            state.partition_field == PART_FIELD_EFI,
        ),
        Line::raw(""),
        row(
            "Format EFI partition:",
            if state.format_efi {
                "yes".to_string()
            } else {
                "no (reuse existing FAT filesystem)".to_string()
            },
            state.partition_field == PART_FIELD_FORMAT_EFI,
        ),
    ];

    let title = match &state.selected_disk {
        Some(disk) => format!("Partitions on {disk}"),
        None => "Partitions".to_string(),
    };
    let body = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(body, area);
}

fn draw_system_config(frame: &mut Frame, state: &AppState, area: Rect) {
    let mut lines = vec![Line::raw("")];
    for (i, field) in state.form_fields.iter().enumerate() {
        let shown = if field.secret {
            "*".repeat(field.value.chars().count())
        } else {
            field.value.clone()
        };
        let focused = i == state.form_focus;
        let cursor = if focused { "_" } else { "" };
        lines.push(Line::from(vec![
            Span::styled(format!("{:<28}", field.label), label_style()),
            Span::styled(
                format!("{shown}{cursor}"),
                if focused { focused_style() } else { Style::default() },
            ),
        ]));
        lines.push(Line::raw(""));
    }

    let body = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("System configuration"),
    );
    frame.render_widget(body, area);
}

fn draw_packages(frame: &mut Frame, state: &AppState, area: Rect) {
    let lines = vec![
        Line::raw(""),
        Line::styled(
            "Edit the list of packages to install (space separated):",
            label_style(),
        ),
        Line::raw(""),
        Line::styled(format!("{}_", state.packages_input), focused_style()),
    ];
    let body = Paragraph::new(Text::from(lines))
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title("Packages"));
    frame.render_widget(body, area);
}

fn draw_summary(frame: &mut Frame, state: &AppState, area: Rect) {
    let Some(config) = &state.config else {
        frame.render_widget(
            Paragraph::new("No configuration assembled yet")
                .block(Block::default().borders(Borders::ALL)),
            area,
        );
        return;
    };

    let entry = |label: &str, value: String| {
        Line::from(vec![
            Span::styled(format!("{label:<16}"), label_style()),
            Span::raw(value),
        ])
    };

    let lines = vec![
        Line::raw(""),
        entry("Seed:", config.seed_device.clone()),
        entry("Sprout:", config.sprout_device.clone()),
        entry(
            "EFI:",
            format!(
                "{}{}",
                config.efi_device,
                if config.format_efi { "" } else { " (reused)" }
            ),
        ),
        Line::raw(""),
        entry("Hostname:", config.hostname.clone()),
        entry("User:", config.username.clone()),
        entry("Timezone:", config.timezone.clone()),
        Line::raw(""),
        entry("Packages:", format!("{} selected", config.packages.len())),
        Line::raw(""),
        if config.dry_run {
            Line::styled("Simulation only: no devices will be touched.", label_style())
        } else {
            Line::styled(
                "WARNING: the selected partitions will be formatted.",
                error_style(),
            )
        },
    ];

    let body = Paragraph::new(Text::from(lines)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Configuration summary"),
    );
    frame.render_widget(body, area);
}

fn draw_installing(frame: &mut Frame, state: &AppState, area: Rect) {
    let visible = area.height.saturating_sub(2) as usize;
    let offset = state
        .log
        .len()
        .saturating_sub(visible)
        .saturating_sub(state.log_scroll)
        .min(u16::MAX as usize) as u16;

    let lines: Vec<Line> = state.log.iter().map(|l| Line::raw(l.as_str())).collect();
    let body = Paragraph::new(Text::from(lines))
        .scroll((offset, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Installation log"),
        );
    frame.render_widget(body, area);
}
