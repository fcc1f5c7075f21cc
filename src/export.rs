//! Spreadsheet export of the deal pipeline.
//!
//! CSV (RFC 4180): comma separated, CRLF line endings, fields quoted when
//! they contain a comma, a quote or a line break. Text that a spreadsheet
//! would read as a formula gets a leading `'`.

use crate::models::{Contact, Deal, StageSet};
use crate::utils::format_date;
use std::collections::HashMap;

const DEAL_HEADER: [&str; 11] = [
    "id",
    "titre",
    "contact",
    "adresse",
    "montant",
    "probabilite",
    "montant_pondere",
    "etape",
    "cloture_prevue",
    "notes",
    "cree_le",
];

fn escape_field(field: &str) -> String {
    let field = if field.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{}", field)
    } else {
        field.to_string()
    };
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field
    }
}

fn write_record(out: &mut String, fields: &[String]) {
    let line: Vec<String> = fields.iter().map(|f| escape_field(f)).collect();
    out.push_str(&line.join(","));
    out.push_str("\r\n");
}

fn opt_num(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Render deals as CSV, in the given order. Contacts are only used to
/// resolve the linked contact's display name.
pub fn deals_to_csv(deals: &[Deal], contacts: &[Contact]) -> String {
    let names: HashMap<&str, String> = contacts
        .iter()
        .map(|c| (c.id.as_str(), c.display_name()))
        .collect();

    let mut out = String::new();
    let header: Vec<String> = DEAL_HEADER.iter().map(|h| h.to_string()).collect();
    write_record(&mut out, &header);
    for deal in deals {
        let contact = deal
            .contact_id
            .as_deref()
            .and_then(|id| names.get(id).cloned())
            .unwrap_or_default();
        write_record(
            &mut out,
            &[
                deal.id.clone(),
                deal.title.clone(),
                contact,
                deal.property_address.clone().unwrap_or_default(),
                opt_num(deal.amount),
                deal.probability.to_string(),
                opt_num(deal.weighted_amount()),
                deal.stage.label().to_string(),
                deal.expected_close_ts.map(format_date).unwrap_or_default(),
                deal.notes.clone().unwrap_or_default(),
                format_date(deal.created_ts),
            ],
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DealStage, NewContact, NewDeal, TenantId};

    #[test]
    fn test_escape_field() {
        assert_eq!(escape_field("plain"), "plain");
        assert_eq!(escape_field("a,b"), "\"a,b\"");
        assert_eq!(escape_field("dit \"oui\""), "\"dit \"\"oui\"\"\"");
        assert_eq!(escape_field("l1\nl2"), "\"l1\nl2\"");
    }

    #[test]
    fn test_formula_fields_are_neutralised() {
        assert_eq!(escape_field("=HYPERLINK(\"http://x\")"), "\"'=HYPERLINK(\"\"http://x\"\")\"");
        assert_eq!(escape_field("+33 6 12 34 56 78"), "'+33 6 12 34 56 78");
        assert_eq!(escape_field("-2%"), "'-2%");
        assert_eq!(escape_field("@SUM(A1)"), "'@SUM(A1)");
        assert_eq!(escape_field("Rue de la Paix"), "Rue de la Paix");

        let mut deal = NewDeal::new("=1+1").into_deal(&TenantId::new("org-1"));
        deal.notes = Some("@agent".to_string());
        let csv = deals_to_csv(&[deal], &[]);
        assert!(csv.contains(",'=1+1,"));
        assert!(csv.contains(",'@agent,"));
    }

    #[test]
    fn test_deals_to_csv() {
        let tenant = TenantId::new("org-1");
        let contact = NewContact::new("Jeanne", "Martin").into_contact(&tenant);
        let mut form = NewDeal::new("Maison, jardin");
        form.contact_id = Some(contact.id.clone());
        form.amount = Some(350_000);
        form.probability = 40;
        let mut deal = form.into_deal(&tenant);
        deal.stage = DealStage::Offre;
        let orphan = NewDeal::new("Studio").into_deal(&tenant);

        let csv = deals_to_csv(&[deal.clone(), orphan], &[contact]);
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("id,titre,contact,"));
        assert!(lines[1].starts_with(&format!("{},\"Maison, jardin\",Jeanne Martin,,350000,40,140000,", deal.id)));
        assert!(lines[2].contains(",Studio,,,,10,,"));
        assert_eq!(lines[3], "");
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let csv = deals_to_csv(&[], &[]);
        assert_eq!(csv.matches("\r\n").count(), 1);
    }
}
