//! Plain-text rendering of the view state.

use std::fmt::Write as _;

use client_core::{Notification, NotificationLevel, ViewState};
use shared::{
    domain::Module,
    protocol::{ConfigurationItem, DashboardStats, Incident, ServiceRequest},
};

const RECENT_INCIDENTS: usize = 5;

pub fn render_view(view: &ViewState) -> String {
    let module = view.active_module();
    let mut out = format!("== {} ==\n", module.title());
    if view.loading() {
        out.push_str("Loading...\n");
        return out;
    }

    match module {
        Module::Dashboard => {
            out.push_str(&stats_panel(view.stats()));
            out.push_str("\nRecent incidents\n");
            let recent = &view.incidents()[..view.incidents().len().min(RECENT_INCIDENTS)];
            out.push_str(&incident_table(recent));
        }
        Module::Incidents => out.push_str(&incident_table(view.incidents())),
        Module::Requests => out.push_str(&request_table(view.requests())),
        Module::Cmdb => out.push_str(&cmdb_table(view.cmdb())),
        Module::Problems
        | Module::Changes
        | Module::Knowledge
        | Module::Users
        | Module::Integrations => {
            let _ = writeln!(out, "The {} module is under development.", module.title());
        }
    }
    out
}

pub fn render_notification(notification: &Notification) -> String {
    let tag = match notification.level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "error",
    };
    format!("[{tag}] {}", notification.message)
}

fn stats_panel(stats: Option<&DashboardStats>) -> String {
    let Some(stats) = stats else {
        return "No statistics available.\n".to_string();
    };
    format!(
        "Open incidents: {}\nSLA compliance: {:.1}%\nActive requests: {}\nActive CIs: {}\n",
        stats.open_incidents, stats.sla_percentage, stats.active_requests, stats.active_ci
    )
}

fn incident_table(incidents: &[Incident]) -> String {
    let rows = incidents
        .iter()
        .map(|i| {
            vec![
                i.incident_id.clone(),
                i.title.clone(),
                i.priority.to_string(),
                i.status.to_string(),
                i.category.map(|c| c.to_string()).unwrap_or_default(),
                i.sla_deadline
                    .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    table(
        &["ID", "Title", "Priority", "Status", "Category", "SLA deadline"],
        &rows,
    )
}

fn request_table(requests: &[ServiceRequest]) -> String {
    let rows = requests
        .iter()
        .map(|r| {
            vec![
                r.request_id.clone(),
                r.title.clone().unwrap_or_default(),
                r.priority.map(|p| p.to_string()).unwrap_or_default(),
                r.status.to_string(),
                r.requester.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    table(&["ID", "Title", "Priority", "Status", "Requester"], &rows)
}

fn cmdb_table(items: &[ConfigurationItem]) -> String {
    let rows = items
        .iter()
        .map(|ci| {
            vec![
                ci.ci_id.clone(),
                ci.name.clone(),
                ci.ci_type.to_string(),
                ci.status.to_string(),
                ci.location.clone().unwrap_or_default(),
                ci.owner.clone().unwrap_or_default(),
            ]
        })
        .collect::<Vec<_>>();
    table(&["ID", "Name", "Type", "Status", "Location", "Owner"], &rows)
}

fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return "(no records)\n".to_string();
    }
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, headers.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_row(&mut out, rule.iter().map(String::as_str), &widths);
    for row in rows {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join(" | ");
    out.push_str(line.trim_end());
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_pads_columns_to_widest_cell() {
        let rendered = table(
            &["ID", "Name"],
            &[
                vec!["CI-001".to_string(), "MAIL-SRV-01".to_string()],
                vec!["CI-002".to_string(), "Сервер".to_string()],
            ],
        );
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(lines[0], "ID     | Name");
        assert_eq!(lines[1], "------ | -----------");
        assert_eq!(lines[2], "CI-001 | MAIL-SRV-01");
        assert_eq!(lines[3], "CI-002 | Сервер");
    }

    #[test]
    fn empty_tables_say_so() {
        assert_eq!(table(&["ID"], &[]), "(no records)\n");
    }

    #[test]
    fn fresh_dashboard_has_no_stats() {
        let rendered = render_view(&ViewState::default());
        assert!(rendered.starts_with("== Dashboard =="));
        assert!(rendered.contains("No statistics available."));
        assert!(rendered.contains("(no records)"));
    }

    #[test]
    fn placeholder_modules_render_notice() {
        let mut view = ViewState::default();
        view.begin(Module::Users);
        assert_eq!(
            render_view(&view),
            "== Users ==\nThe Users module is under development.\n"
        );
    }

    #[test]
    fn loading_view_hides_stale_rows() {
        let mut view = ViewState::default();
        view.begin(Module::Incidents);
        assert_eq!(render_view(&view), "== Incidents ==\nLoading...\n");
    }

    #[test]
    fn notifications_are_tagged_by_level() {
        assert_eq!(
            render_notification(&Notification::error("Failed to load cmdb")),
            "[error] Failed to load cmdb"
        );
        assert_eq!(
            render_notification(&Notification::success("Incident created successfully")),
            "[ok] Incident created successfully"
        );
    }
}
