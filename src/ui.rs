use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget, Wrap},
};
use unicode_width::UnicodeWidthStr;
use webbrowser::Browser;

use crate::app::{App, AppState};
use crate::clock::{Clock, Millis};
use crate::config::{PenaltyMode, StimulusRule};
use crate::input::arena_to_cell;
use crate::session::Phase;
use crate::stimulus::{Shape, Stimulus, StimulusKind};
use crate::store::Store;

const HORIZONTAL_MARGIN: u16 = 2;

/// Terminal color for a palette name
pub fn color_for(name: &str) -> Color {
    match name {
        "Red" => Color::Red,
        "Blue" => Color::Blue,
        "Green" => Color::Green,
        "Yellow" => Color::Yellow,
        "Purple" => Color::Magenta,
        "Orange" => Color::Rgb(255, 165, 0),
        "Pink" => Color::Rgb(255, 105, 180),
        "Indigo" => Color::Rgb(75, 0, 130),
        _ => Color::White,
    }
}

fn centered(text: impl Into<String>, style: Style, area: Rect, buf: &mut Buffer) {
    let text = text.into();
    let y = area.y + area.height / 2;
    let width = (text.width() as u16).min(area.width);
    let x = area.x + area.width.saturating_sub(width) / 2;
    if area.height > 0 && area.width > 0 {
        buf.set_stringn(x, y, &text, area.width as usize, style);
    }
}

impl<S: Store, C: Clock> Widget for &App<S, C> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        match self.state {
            AppState::Playing => render_playing(self, area, buf),
            AppState::Results => render_results(self, area, buf),
        }
    }
}

fn render_playing<S: Store, C: Clock>(app: &App<S, C>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let dim_style = Style::default().add_modifier(Modifier::DIM);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(1),
        ])
        .split(area);

    let engine = &app.engine;
    let session = engine.session();
    let now = app.now();

    let mut header = vec![
        Span::styled(app.kind().name(), bold_style),
        Span::raw(format!("   score {}", session.score)),
        Span::raw(format!("   round {}", session.round)),
    ];
    if engine.rules().scoring.penalties.mode == PenaltyMode::Ledger {
        header.push(Span::styled(
            format!("   penalty {}", session.penalty_points),
            Style::default().fg(Color::Red),
        ));
    }
    if let Some(left) = engine.time_remaining(now) {
        header.push(Span::raw(format!("   {:.1}s left", left as f64 / 1000.0)));
    }
    if let Some(best) = app.previous_best {
        header.push(Span::styled(format!("   best {best}"), dim_style));
    }
    Paragraph::new(Line::from(header)).render(chunks[0], buf);

    let mut status = Vec::new();
    if let Some(target) = &session.target_color {
        status.push(Span::raw("catch "));
        status.push(Span::styled(
            target.clone(),
            Style::default().patch(bold_style).fg(color_for(target)),
        ));
    }
    if let Some(delta) = app.last_delta {
        let style = if delta.points >= 0 {
            Style::default().fg(Color::Green)
        } else {
            Style::default().fg(Color::Red)
        };
        status.push(Span::styled(
            format!("  {} {:+}", delta.reason, delta.points),
            style,
        ));
    }
    Paragraph::new(Line::from(status)).render(chunks[1], buf);

    let block = Block::default().borders(Borders::ALL);
    let arena_area = block.inner(chunks[2]);
    block.render(chunks[2], buf);
    app.arena_area.set(arena_area);

    match session.phase {
        Phase::Idle => centered("get ready", italic_style, arena_area, buf),
        Phase::Countdown { .. } => {
            let secs = engine
                .countdown_remaining(now)
                .map(|ms| ms.div_ceil(1000))
                .unwrap_or(0);
            centered(secs.to_string(), bold_style, arena_area, buf);
        }
        Phase::BetweenRounds { .. } => centered("...", dim_style, arena_area, buf),
        Phase::Playing if arena_area.area() > 0 => {
            if session.active.is_empty() {
                centered("wait for it", dim_style, arena_area, buf);
            }
            let direct = app.direct_targets();
            for stimulus in &session.active {
                let label = direct.iter().position(|id| *id == stimulus.id).map(|i| i + 1);
                render_stimulus(app, stimulus, label, now, arena_area, buf);
            }
        }
        Phase::Playing | Phase::Finished | Phase::Abandoned => {}
    }

    let legend = match &engine.rules().stimulus {
        StimulusRule::NumberGrid => format!("type the number + enter: {}_   (esc)ape", app.entry),
        StimulusRule::ColorChoice { .. } | StimulusRule::ColorWord { .. } => {
            String::from("(1-9) pick   (esc)ape")
        }
        StimulusRule::Pattern { .. } => String::from("(1-9) pads   (esc)ape"),
        StimulusRule::Circles { .. } => String::from("click or (1-9) a circle   (esc)ape"),
        _ => String::from("(space) tap   (x) background   (esc)ape"),
    };
    Paragraph::new(Span::styled(legend, italic_style)).render(chunks[3], buf);
}

fn options_line(options: &[String]) -> Line<'static> {
    let spans: Vec<Span> = options
        .iter()
        .enumerate()
        .map(|(i, o)| {
            Span::styled(
                format!(" {}) {} ", i + 1, o),
                Style::default().add_modifier(Modifier::BOLD),
            )
        })
        .collect();
    Line::from(spans)
}

fn render_stimulus<S: Store, C: Clock>(
    app: &App<S, C>,
    stimulus: &Stimulus,
    label: Option<usize>,
    now: Millis,
    area: Rect,
    buf: &mut Buffer,
) {
    let arena = app.engine.arena();
    let bold_style = Style::default().add_modifier(Modifier::BOLD);

    match &stimulus.kind {
        StimulusKind::ColorSwatch { color } => {
            Block::default()
                .style(Style::default().bg(color_for(color)))
                .render(area, buf);
        }
        StimulusKind::Ball { position, .. } => {
            let (x, y) = arena_to_cell(area, *position, arena);
            buf.set_string(x, y, "●", Style::default().patch(bold_style).fg(Color::Yellow));
        }
        StimulusKind::Circle {
            position, color, ..
        } => {
            let (x, y) = arena_to_cell(area, *position, arena);
            let text = match label {
                Some(n) => format!("●{n}"),
                None => String::from("●"),
            };
            buf.set_stringn(
                x,
                y,
                text,
                (area.x + area.width).saturating_sub(x) as usize,
                Style::default().fg(color_for(color)),
            );
        }
        StimulusKind::Shape {
            shape, position, ..
        } => {
            let (x, y) = arena_to_cell(area, *position, arena);
            let glyph = match shape {
                Shape::Circle => "●",
                Shape::Square => "■",
                Shape::Triangle => "▲",
            };
            buf.set_string(x, y, glyph, Style::default().patch(bold_style).fg(Color::Cyan));
        }
        StimulusKind::NumberGrid {
            size,
            cells,
            target,
        } => {
            let mut lines = vec![
                Line::from(Span::styled(format!("find {target}"), bold_style)),
                Line::default(),
            ];
            for row in cells.chunks((*size).max(1) as usize) {
                lines.push(Line::from(
                    row.iter().map(|v| format!("{v:>4}")).collect::<String>(),
                ));
            }
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .render(area, buf);
        }
        StimulusKind::ColorChoice { target, options } => {
            let lines = vec![
                Line::from(Span::styled(
                    "        ",
                    Style::default().bg(color_for(target)),
                )),
                Line::default(),
                options_line(options),
            ];
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(area, buf);
        }
        StimulusKind::ColorWord { word, ink, options } => {
            let lines = vec![
                Line::from(Span::styled(
                    word.to_uppercase(),
                    Style::default().patch(bold_style).fg(color_for(ink)),
                )),
                Line::default(),
                options_line(options),
            ];
            Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .render(area, buf);
        }
        StimulusKind::PatternStep { sequence, index } => {
            let (pads, step_ms) = match app.engine.rules().stimulus {
                StimulusRule::Pattern {
                    pads,
                    reveal_step_ms,
                } => (pads, reveal_step_ms),
                _ => (4, 800),
            };
            // While revealing, light the pad for the current step.
            let lit = if now < stimulus.spawned_at {
                let reveal_start = stimulus
                    .spawned_at
                    .saturating_sub((sequence.len() as Millis + 1) * step_ms);
                let step = (now.saturating_sub(reveal_start) / step_ms.max(1)) as usize;
                sequence.get(step).copied()
            } else {
                None
            };
            let spans: Vec<Span> = (0..pads)
                .map(|pad| {
                    let style = if lit == Some(pad) {
                        Style::default().bg(Color::Yellow).fg(Color::Black)
                    } else {
                        Style::default().add_modifier(Modifier::DIM)
                    };
                    Span::styled(format!("  {}  ", pad + 1), style)
                })
                .collect();
            let progress = if lit.is_some() || now < stimulus.spawned_at {
                String::from("watch")
            } else {
                format!("{}/{}", index + 1, sequence.len())
            };
            Paragraph::new(vec![
                Line::from(Span::styled(progress, bold_style)),
                Line::default(),
                Line::from(spans),
            ])
            .alignment(Alignment::Center)
            .render(area, buf);
        }
    }
}

fn render_results<S: Store, C: Clock>(app: &App<S, C>, area: Rect, buf: &mut Buffer) {
    let bold_style = Style::default().add_modifier(Modifier::BOLD);
    let italic_style = Style::default().add_modifier(Modifier::ITALIC);

    let Some(report) = &app.report else {
        return;
    };
    let summary = &report.summary;

    let fmt_ms = |v: Option<Millis>| v.map_or(String::from("-"), |ms| format!("{ms} ms"));

    let mut lines = vec![
        Line::from(Span::styled(report.kind.name(), bold_style)),
        Line::default(),
        Line::from(format!(
            "score {}   net {}   {:.2}s",
            summary.final_score,
            summary.net_score,
            summary.elapsed_ms as f64 / 1000.0
        )),
        Line::from(format!(
            "{} hits / {} responses   {:.0}% acc   {} penalties",
            summary.hits, summary.response_count, summary.accuracy, summary.penalty_clicks
        )),
        Line::from(format!(
            "avg {}   best {}   worst {}",
            summary
                .average_latency_ms
                .map_or(String::from("-"), |avg| format!("{avg:.0} ms")),
            fmt_ms(summary.best_latency_ms),
            fmt_ms(summary.worst_latency_ms),
        )),
    ];
    if let Some(tier) = summary.tier {
        lines.push(Line::from(Span::styled(
            tier.to_string(),
            Style::default().patch(bold_style).fg(Color::Cyan),
        )));
    }
    if app.record.as_ref().is_some_and(|r| r.is_new_high_score) {
        lines.push(Line::from(Span::styled(
            "new high score!",
            Style::default().patch(bold_style).fg(Color::Green),
        )));
    }
    if let Some(streak) = app.streak {
        lines.push(Line::from(format!("daily streak: {}", streak.count)));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .constraints([
            Constraint::Min(lines.len() as u16),
            Constraint::Length(1),
        ])
        .split(area);

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

    let legend = Paragraph::new(Span::styled(
        String::from(if Browser::is_available() {
            "(r)etry / (s)hare / (esc)ape"
        } else {
            "(r)etry / (esc)ape"
        }),
        italic_style,
    ));
    legend.render(chunks[1], buf);
}
