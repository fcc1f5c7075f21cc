// Contact and deal commands, stage moves, board and export

use crate::cli::commands::{App, BoardCommands, ContactCommands, DealCommands};
use crate::cli::error::{parse_stage, user_error};
use crate::cli::output::{
    format_board, format_contact_summary, format_contact_table, format_deal_board_totals, format_deal_summary,
    format_deal_table, get_terminal_width, is_tty, short_id,
};
use crate::export::deals_to_csv;
use crate::filter::{filter_items, parse_filter, sort_items, Filterable, SortKey};
use crate::models::{Contact, ContactPatch, Deal, DealPatch, NewContact, NewDeal, StageSet};
use crate::pipeline::{DropTarget, MoveOutcome, PipelineEntity, StageEngine};
use crate::repo::{resolve_id_prefix, ActivityRepo, ContactRepo, DealRepo};
use crate::utils::parse_date_expr;
use anyhow::{Context, Result};
use serde::Serialize;

pub fn handle_contacts(app: &App, cmd: ContactCommands) -> Result<()> {
    let acc = app.accessor();
    match cmd {
        ContactCommands::Add {
            first_name,
            last_name,
            email,
            phone,
            source,
            budget,
            notes,
        } => {
            let form = NewContact {
                first_name,
                last_name,
                email,
                phone,
                source,
                budget,
                notes,
            };
            let contact = ContactRepo::create(&acc, form)?;
            println!("Created contact {} (id: {})", contact.display_name(), short_id(&contact.id));
            Ok(())
        }
        ContactCommands::List { filter, sort, json } => {
            let contacts = ContactRepo::list(&acc, None)?;
            let contacts = select_items(&contacts, filter, sort.as_deref());
            print_list(&contacts, json, "contacts", format_contact_table)
        }
        ContactCommands::Show { id, json } => {
            let contact = ContactRepo::get(&acc, &ContactRepo::resolve_id(&acc, &id)?)?;
            let deals = DealRepo::list_for_contact(&acc, &contact.id)?;
            let activities = ActivityRepo::list_for_contact(&acc, &contact.id)?;
            if json {
                let value = serde_json::json!({
                    "contact": contact,
                    "deals": deals,
                    "activities": activities,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                let now = chrono::Utc::now().timestamp();
                print!("{}", format_contact_summary(&contact, &deals, &activities, now));
            }
            Ok(())
        }
        ContactCommands::Modify {
            id,
            first_name,
            last_name,
            email,
            phone,
            source,
            budget,
            notes,
        } => {
            let id = ContactRepo::resolve_id(&acc, &id)?;
            let patch = ContactPatch {
                first_name,
                last_name,
                email,
                phone,
                source,
                budget,
                stage: None,
                notes,
            };
            let contact = ContactRepo::update(&acc, &id, &patch)?;
            println!("Modified contact {}", contact.display_name());
            Ok(())
        }
        ContactCommands::Delete { id } => {
            let contact = ContactRepo::get(&acc, &ContactRepo::resolve_id(&acc, &id)?)?;
            ContactRepo::delete(&acc, &contact.id)?;
            println!("Deleted contact {}", contact.display_name());
            Ok(())
        }
        ContactCommands::Move { id, target } => handle_move::<Contact>(app, &id, &target),
    }
}

pub fn handle_deals(app: &App, cmd: DealCommands) -> Result<()> {
    let acc = app.accessor();
    match cmd {
        DealCommands::Add {
            title,
            contact,
            address,
            amount,
            probability,
            close,
            notes,
        } => {
            let mut form = NewDeal::new(title.join(" "));
            form.contact_id = contact.map(|c| ContactRepo::resolve_id(&acc, &c)).transpose()?;
            form.property_address = address;
            form.amount = amount;
            if let Some(probability) = probability {
                form.probability = probability;
            }
            form.expected_close_ts = close.as_deref().map(parse_date_expr).transpose()?;
            form.notes = notes;
            let deal = DealRepo::create(&acc, form)?;
            println!("Created deal '{}' (id: {})", deal.title, short_id(&deal.id));
            Ok(())
        }
        DealCommands::List { filter, sort, json } => {
            let deals = DealRepo::list(&acc, None)?;
            let deals = select_items(&deals, filter, sort.as_deref());
            print_list(&deals, json, "deals", format_deal_table)
        }
        DealCommands::Show { id, json } => {
            let deal = DealRepo::get(&acc, &DealRepo::resolve_id(&acc, &id)?)?;
            let contact = match &deal.contact_id {
                Some(contact_id) => Some(ContactRepo::get(&acc, contact_id)?),
                None => None,
            };
            let activities = ActivityRepo::list_for_deal(&acc, &deal.id)?;
            if json {
                let value = serde_json::json!({
                    "deal": deal,
                    "contact": contact,
                    "activities": activities,
                });
                println!("{}", serde_json::to_string_pretty(&value)?);
            } else {
                let now = chrono::Utc::now().timestamp();
                print!("{}", format_deal_summary(&deal, contact.as_ref(), &activities, now));
            }
            Ok(())
        }
        DealCommands::Modify {
            id,
            title,
            contact,
            address,
            amount,
            probability,
            close,
            notes,
        } => {
            let id = DealRepo::resolve_id(&acc, &id)?;
            let patch = DealPatch {
                title,
                contact_id: contact.map(|c| ContactRepo::resolve_id(&acc, &c)).transpose()?,
                property_address: address,
                amount,
                probability,
                stage: None,
                expected_close_ts: close.as_deref().map(parse_date_expr).transpose()?,
                notes,
            };
            let deal = DealRepo::update(&acc, &id, patch)?;
            println!("Modified deal '{}'", deal.title);
            Ok(())
        }
        DealCommands::Delete { id } => {
            let deal = DealRepo::get(&acc, &DealRepo::resolve_id(&acc, &id)?)?;
            DealRepo::delete(&acc, &deal.id)?;
            println!("Deleted deal '{}'", deal.title);
            Ok(())
        }
        DealCommands::Move { id, target } => handle_move::<Deal>(app, &id, &target),
        DealCommands::Export { output } => {
            let deals = DealRepo::list(&acc, None)?;
            let contacts = ContactRepo::list(&acc, None)?;
            let csv = deals_to_csv(&deals, &contacts);
            match output {
                Some(path) => {
                    std::fs::write(&path, csv)
                        .with_context(|| format!("Failed to write export: {}", path.display()))?;
                    println!("Exported {} deal(s) to {}", deals.len(), path.display());
                }
                None => print!("{}", csv),
            }
            Ok(())
        }
    }
}

pub fn handle_board(app: &App, cmd: BoardCommands) -> Result<()> {
    match cmd {
        BoardCommands::Contacts { json } => {
            let engine = load_engine::<Contact>(app)?;
            print_board(&engine, json)
        }
        BoardCommands::Deals { json } => {
            let engine = load_engine::<Deal>(app)?;
            print_board(&engine, json)?;
            if !json {
                print!("{}", format_deal_board_totals(&engine.board()));
            }
            Ok(())
        }
    }
}

/// Apply CLI filter and sort arguments; bad input is a user error
fn select_items<T>(items: &[T], filter: Vec<String>, sort: Option<&str>) -> Vec<T>
where
    T: Filterable + Clone,
{
    let expr = parse_filter(filter).unwrap_or_else(|e| user_error(&format!("Filter parse error: {}", e)));
    if let Err(e) = expr.check_stages::<T::Stage>() {
        user_error(&e);
    }
    let mut selected = filter_items(items, &expr);
    if let Some(sort) = sort {
        let key = SortKey::parse(sort).unwrap_or_else(|e| user_error(&e));
        sort_items(&mut selected, key);
    }
    selected
}

fn print_list<T: Serialize>(items: &[T], json: bool, label: &str, table: fn(&[T]) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else if items.is_empty() {
        println!("No {} found.", label);
    } else {
        print!("{}", table(items));
    }
    Ok(())
}

fn load_engine<E: PipelineEntity>(app: &App) -> Result<StageEngine<E>> {
    let acc = app.accessor();
    let mut engine = StageEngine::new(acc.session());
    engine.load(&acc)?;
    Ok(engine)
}

fn print_board<E: PipelineEntity + Serialize>(engine: &StageEngine<E>, json: bool) -> Result<()> {
    let board = engine.board();
    if json {
        let columns: Vec<serde_json::Value> = board
            .columns()
            .iter()
            .map(|c| {
                serde_json::json!({
                    "stage": c.stage.as_str(),
                    "label": c.stage.label(),
                    "cards": c.cards,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&columns)?);
    } else {
        print!("{}", format_board(&board, get_terminal_width(), is_tty()));
    }
    Ok(())
}

/// Resolve the move target: a stage name, or a card whose column is the target
fn resolve_target<E: PipelineEntity>(ids: &[String], target: &str) -> DropTarget<E::Stage> {
    match parse_stage::<E::Stage>(target) {
        Ok(stage) => DropTarget::Column(stage),
        Err(stage_err) => match resolve_id_prefix(ids.iter().map(String::as_str), target, E::LABEL) {
            Ok(card) => DropTarget::Card(card),
            Err(_) => user_error(&stage_err),
        },
    }
}

fn handle_move<E: PipelineEntity>(app: &App, id: &str, target: &str) -> Result<()> {
    let acc = app.accessor();
    let mut engine: StageEngine<E> = StageEngine::new(acc.session());
    engine.load(&acc)?;

    let ids: Vec<String> = engine.entities().iter().map(|e| e.id().to_string()).collect();
    let id = resolve_id_prefix(ids.iter().map(String::as_str), id, E::LABEL)?;
    let over = resolve_target::<E>(&ids, target);
    let title = engine.find(&id).map(|e| e.title()).unwrap_or_default();
    let label = E::LABEL.to_lowercase();

    match engine.move_entity(&acc, &id, &over)? {
        MoveOutcome::Moved { from, to } => {
            println!("Moved {} '{}' from {} to {}", label, title, from.label(), to.label());
            Ok(())
        }
        MoveOutcome::Unchanged => {
            let stage = engine.find(&id).map(|e| e.stage().label()).unwrap_or("-");
            println!("{} '{}' is already in {}", E::LABEL, title, stage);
            Ok(())
        }
        MoveOutcome::RolledBack { error, .. } => Err(error.into()),
    }
}
