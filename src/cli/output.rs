// Human-readable output for the CLI: tables, summaries and the kanban board

use crate::models::{
    Activity, Contact, Deal, EmailTemplate, Organization, OrganizationMember, StageSet, TenantId,
};
use crate::pipeline::{Board, PipelineEntity};
use crate::utils::{format_date, format_datetime};
use std::io::IsTerminal;

const ANSI_BOLD: &str = "\x1b[1m";
const ANSI_DIM: &str = "\x1b[2m";
const ANSI_RED: &str = "\x1b[31m";
const ANSI_RESET: &str = "\x1b[0m";

/// Narrowest board column before falling back to a stacked layout
const MIN_BOARD_COLUMN: usize = 16;

/// Check if stdout is a terminal (TTY)
pub fn is_tty() -> bool {
    std::io::stdout().is_terminal()
}

/// Terminal width from `terminal_size`, then `COLUMNS`, then 120
pub fn get_terminal_width() -> usize {
    if let Some((terminal_size::Width(w), _)) = terminal_size::terminal_size() {
        if w > 0 {
            return w as usize;
        }
    }
    if let Ok(cols) = std::env::var("COLUMNS") {
        if let Ok(width) = cols.parse::<usize>() {
            if width > 0 && width < 10000 {
                return width;
            }
        }
    }
    120
}

fn styled(text: &str, style: &str, is_tty: bool) -> String {
    if is_tty {
        format!("{}{}{}", style, text, ANSI_RESET)
    } else {
        text.to_string()
    }
}

/// First 8 characters of a uuid, enough to address a row from the CLI
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// Truncate to `width` characters, marking the cut with `..`
pub fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    if width <= 2 {
        return text.chars().take(width).collect();
    }
    let mut out: String = text.chars().take(width - 2).collect();
    out.push_str("..");
    out
}

/// `1 250 000 €`
/// Sum of amounts, pinned at the i64 bounds
pub fn saturating_total(amounts: impl Iterator<Item = i64>) -> i64 {
    amounts.fold(0i64, i64::saturating_add)
}

pub fn format_money(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(c);
    }
    if amount < 0 {
        format!("-{} €", grouped)
    } else {
        format!("{} €", grouped)
    }
}

fn or_dash(value: Option<&str>) -> &str {
    value.filter(|v| !v.is_empty()).unwrap_or("-")
}

pub fn format_contact_table(contacts: &[Contact]) -> String {
    let mut out = format!(
        "{:<9} {:<24} {:<14} {:<28} {:<16} {:>12}\n",
        "ID", "Name", "Stage", "Email", "Phone", "Budget"
    );
    out.push_str(&"-".repeat(108));
    out.push('\n');
    for c in contacts {
        out.push_str(&format!(
            "{:<9} {:<24} {:<14} {:<28} {:<16} {:>12}\n",
            short_id(&c.id),
            truncate(&c.display_name(), 24),
            c.stage.label(),
            truncate(or_dash(c.email.as_deref()), 28),
            or_dash(c.phone.as_deref()),
            c.budget.map(format_money).unwrap_or_else(|| "-".to_string()),
        ));
    }
    out
}

pub fn format_deal_table(deals: &[Deal]) -> String {
    let mut out = format!(
        "{:<9} {:<30} {:<13} {:>14} {:>5} {:>14}\n",
        "ID", "Title", "Stage", "Amount", "Prob", "Weighted"
    );
    out.push_str(&"-".repeat(90));
    out.push('\n');
    for d in deals {
        out.push_str(&format!(
            "{:<9} {:<30} {:<13} {:>14} {:>4}% {:>14}\n",
            short_id(&d.id),
            truncate(&d.title, 30),
            d.stage.label(),
            d.amount.map(format_money).unwrap_or_else(|| "-".to_string()),
            d.probability,
            d.weighted_amount().map(format_money).unwrap_or_else(|| "-".to_string()),
        ));
    }
    let total = saturating_total(deals.iter().filter_map(|d| d.amount));
    let weighted = saturating_total(deals.iter().filter_map(|d| d.weighted_amount()));
    out.push_str(&format!(
        "\n{} deal(s), total {}, weighted {}\n",
        deals.len(),
        format_money(total),
        format_money(weighted)
    ));
    out
}

pub fn format_activity_table(activities: &[Activity], now: i64, is_tty: bool) -> String {
    let mut out = format!(
        "{:<9} {:<32} {:<12} {:<9} {:<9} {:<16}\n",
        "ID", "Title", "Type", "Priority", "Status", "Due"
    );
    out.push_str(&"-".repeat(92));
    out.push('\n');
    for a in activities {
        let due = a.due_ts.map(format_datetime).unwrap_or_else(|| "-".to_string());
        let due = if a.is_overdue(now) {
            styled(&format!("{:<16}", due), ANSI_RED, is_tty)
        } else {
            format!("{:<16}", due)
        };
        out.push_str(&format!(
            "{:<9} {:<32} {:<12} {:<9} {:<9} {}\n",
            short_id(&a.id),
            truncate(&a.title, 32),
            a.activity_type.as_str(),
            a.priority.as_str(),
            a.status.as_str(),
            due,
        ));
    }
    out
}

pub fn format_template_table(templates: &[EmailTemplate]) -> String {
    let mut out = format!("{:<9} {:<20} {}\n", "ID", "Name", "Subject");
    out.push_str(&"-".repeat(70));
    out.push('\n');
    for t in templates {
        out.push_str(&format!(
            "{:<9} {:<20} {}\n",
            short_id(&t.id),
            truncate(&t.name, 20),
            truncate(&t.subject, 40)
        ));
    }
    out
}

pub fn format_organization_table(orgs: &[Organization], current: Option<&TenantId>) -> String {
    let mut out = format!("  {:<38} {}\n", "ID", "Name");
    out.push_str(&"-".repeat(70));
    out.push('\n');
    for org in orgs {
        let marker = if current == Some(&org.id) { "*" } else { " " };
        out.push_str(&format!("{} {:<38} {}\n", marker, org.id.as_str(), org.name));
    }
    out
}

pub fn format_member_table(members: &[OrganizationMember]) -> String {
    let mut out = format!("{:<24} {:<8} {}\n", "User", "Role", "Since");
    for m in members {
        out.push_str(&format!(
            "{:<24} {:<8} {}\n",
            m.user_id,
            m.role.as_str(),
            format_date(m.created_ts)
        ));
    }
    out
}

fn push_field(out: &mut String, label: &str, value: Option<String>) {
    out.push_str(&format!(
        "  {:<13}{}\n",
        format!("{}:", label),
        value.unwrap_or_else(|| "(none)".to_string())
    ));
}

fn push_activities(out: &mut String, activities: &[Activity], now: i64) {
    if activities.is_empty() {
        return;
    }
    out.push_str("\nActivities:\n");
    for a in activities {
        let due = a.due_ts.map(format_datetime).unwrap_or_else(|| "-".to_string());
        let overdue = if a.is_overdue(now) { " (overdue)" } else { "" };
        out.push_str(&format!(
            "  {} [{}] {} - {}{}\n",
            short_id(&a.id),
            a.status.as_str(),
            a.title,
            due,
            overdue
        ));
    }
}

pub fn format_contact_summary(contact: &Contact, deals: &[Deal], activities: &[Activity], now: i64) -> String {
    let header = format!("Contact {}: {}", short_id(&contact.id), contact.display_name());
    let mut out = format!("{}\n{}\n\n", header, "=".repeat(header.chars().count().max(60)));
    push_field(&mut out, "Stage", Some(contact.stage.label().to_string()));
    push_field(&mut out, "Email", contact.email.clone());
    push_field(&mut out, "Phone", contact.phone.clone());
    push_field(&mut out, "Source", contact.source.clone());
    push_field(&mut out, "Budget", contact.budget.map(format_money));
    push_field(&mut out, "Created", Some(format_datetime(contact.created_ts)));
    push_field(&mut out, "Modified", Some(format_datetime(contact.modified_ts)));
    if let Some(notes) = &contact.notes {
        out.push_str(&format!("\nNotes:\n  {}\n", notes));
    }
    if !deals.is_empty() {
        out.push_str("\nDeals:\n");
        for d in deals {
            out.push_str(&format!("  {} {} ({}, {}%)\n", short_id(&d.id), d.title, d.stage.label(), d.probability));
        }
    }
    push_activities(&mut out, activities, now);
    out
}

pub fn format_deal_summary(deal: &Deal, contact: Option<&Contact>, activities: &[Activity], now: i64) -> String {
    let header = format!("Deal {}: {}", short_id(&deal.id), deal.title);
    let mut out = format!("{}\n{}\n\n", header, "=".repeat(header.chars().count().max(60)));
    push_field(&mut out, "Stage", Some(deal.stage.label().to_string()));
    push_field(&mut out, "Contact", contact.map(|c| c.display_name()));
    push_field(&mut out, "Address", deal.property_address.clone());
    push_field(&mut out, "Amount", deal.amount.map(format_money));
    push_field(&mut out, "Probability", Some(format!("{}%", deal.probability)));
    push_field(&mut out, "Weighted", deal.weighted_amount().map(format_money));
    push_field(&mut out, "Closing", deal.expected_close_ts.map(format_date));
    push_field(&mut out, "Created", Some(format_datetime(deal.created_ts)));
    push_field(&mut out, "Modified", Some(format_datetime(deal.modified_ts)));
    if let Some(notes) = &deal.notes {
        out.push_str(&format!("\nNotes:\n  {}\n", notes));
    }
    push_activities(&mut out, activities, now);
    out
}

/// Kanban board, one column per stage. Columns sit side by side when the
/// terminal is wide enough, otherwise they are stacked.
pub fn format_board<E: PipelineEntity>(board: &Board<E>, width: usize, is_tty: bool) -> String {
    let columns = board.columns();
    if columns.is_empty() {
        return String::new();
    }
    let col_width = width.saturating_sub(columns.len() - 1) / columns.len();

    if col_width < MIN_BOARD_COLUMN {
        let mut out = String::new();
        for column in columns {
            out.push_str(&styled(
                &format!("{} ({})", column.stage.label(), column.cards.len()),
                ANSI_BOLD,
                is_tty,
            ));
            out.push('\n');
            if column.cards.is_empty() {
                out.push_str(&styled("  -", ANSI_DIM, is_tty));
                out.push('\n');
            }
            for card in &column.cards {
                out.push_str(&format!("  {} {}\n", short_id(card.id()), truncate(&card.title(), width.saturating_sub(12))));
            }
        }
        return out;
    }

    let mut out = String::new();
    let headers: Vec<String> = columns
        .iter()
        .map(|c| {
            let text = truncate(&format!("{} ({})", c.stage.label(), c.cards.len()), col_width);
            styled(&format!("{:<w$}", text, w = col_width), ANSI_BOLD, is_tty)
        })
        .collect();
    out.push_str(headers.join(" ").trim_end());
    out.push('\n');
    let rule: Vec<String> = columns.iter().map(|_| "-".repeat(col_width)).collect();
    out.push_str(&rule.join(" "));
    out.push('\n');

    let depth = columns.iter().map(|c| c.cards.len()).max().unwrap_or(0);
    for row in 0..depth {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| {
                let text = c
                    .cards
                    .get(row)
                    .map(|card| truncate(&format!("{} {}", short_id(card.id()), card.title()), col_width))
                    .unwrap_or_default();
                format!("{:<w$}", text, w = col_width)
            })
            .collect();
        out.push_str(cells.join(" ").trim_end());
        out.push('\n');
    }
    out
}

/// Per-stage totals for a deal board: count, amount and weighted amount
pub fn format_deal_board_totals(board: &Board<Deal>) -> String {
    let mut out = String::from("\n");
    for column in board.columns() {
        let amount = saturating_total(column.cards.iter().filter_map(|d| d.amount));
        let weighted = saturating_total(column.cards.iter().filter_map(|d| d.weighted_amount()));
        out.push_str(&format!(
            "{:<13} {:>3}  {:>16}  {:>16}\n",
            column.stage.label(),
            column.cards.len(),
            format_money(amount),
            format_money(weighted)
        ));
    }
    out
}
