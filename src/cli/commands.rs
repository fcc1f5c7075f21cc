use crate::accessor::TenantAccessor;
use crate::cli::commands_pipeline::{handle_board, handle_contacts, handle_deals};
use crate::cli::error::{parse_amount, parse_choice, parse_probability, user_error, validate_non_empty};
use crate::cli::output::{
    format_activity_table, format_member_table, format_organization_table, format_template_table, is_tty,
    short_id,
};
use crate::compose::{prefill_body, CommandGenerator};
use crate::config::{Config, COMPOSE_COMMAND, SESSION_ORGANIZATION, SESSION_USER};
use crate::db::{DbConnection, SqliteBackend};
use crate::models::{
    ActivityType, AuthContext, NewActivity, NewTemplate, Priority, Session, TemplatePatch, TemplateVars,
};
use crate::notify::TerminalNotifier;
use crate::repo::{ActivityRepo, ContactRepo, DealRepo, OrganizationRepo, TemplateRepo};
use crate::utils::parse_date_expr;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "immocrm")]
#[command(about = "Real-estate CRM - contact and deal pipelines for agencies")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in as a user
    Login {
        /// User id handed over by the identity provider
        user: String,
    },
    /// Sign out and forget the selected organization
    Logout,
    /// Show the signed-in user and selected organization
    Whoami,
    /// Organization (agency) management
    Org {
        #[command(subcommand)]
        subcommand: OrgCommands,
    },
    /// Contacts (leads) and their pipeline
    Contacts {
        #[command(subcommand)]
        subcommand: ContactCommands,
    },
    /// Deals and their pipeline
    Deals {
        #[command(subcommand)]
        subcommand: DealCommands,
    },
    /// Calls, visits, appointments and tasks
    Activities {
        #[command(subcommand)]
        subcommand: ActivityCommands,
    },
    /// Email templates
    Templates {
        #[command(subcommand)]
        subcommand: TemplateCommands,
    },
    /// Kanban board of a pipeline
    Board {
        #[command(subcommand)]
        subcommand: BoardCommands,
    },
}

#[derive(Subcommand)]
pub enum OrgCommands {
    /// Create an organization and select it
    Create {
        /// Organization name
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// List organizations you belong to
    List {
        #[arg(long)]
        json: bool,
    },
    /// Select the organization to work in
    Use {
        /// Organization id (or unique prefix)
        id: String,
    },
    /// List members of the selected organization
    Members {
        #[arg(long)]
        json: bool,
    },
    /// Add an agent to the selected organization (owners only)
    AddMember {
        /// User id of the agent
        user: String,
    },
}

#[derive(Subcommand)]
pub enum ContactCommands {
    /// Add a contact
    Add {
        first_name: String,
        last_name: String,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Lead source (portal, referral, ...)
        #[arg(long)]
        source: Option<String>,
        /// Purchase budget in euros
        #[arg(long, value_parser = parse_amount)]
        budget: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List contacts
    List {
        /// Filter terms (e.g. "stage=mandat source=seloger +lyon")
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filter: Vec<String>,
        /// Sort key: created, name, amount, probability, stage
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show a contact with its deals and activities
    Show {
        /// Contact id (or unique prefix)
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Modify contact fields
    Modify {
        id: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        source: Option<String>,
        #[arg(long, value_parser = parse_amount)]
        budget: Option<i64>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a contact
    Delete { id: String },
    /// Move a contact to another stage
    Move {
        id: String,
        /// Target stage, or the id of a card already in the target column
        target: String,
    },
}

#[derive(Subcommand)]
pub enum DealCommands {
    /// Add a deal
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        /// Linked contact id (or unique prefix)
        #[arg(long)]
        contact: Option<String>,
        /// Property address
        #[arg(long)]
        address: Option<String>,
        /// Expected amount in euros
        #[arg(long, value_parser = parse_amount)]
        amount: Option<i64>,
        /// Win probability (0-100)
        #[arg(long, value_parser = parse_probability)]
        probability: Option<i64>,
        /// Expected closing date (e.g. 2026-06-30, +30d)
        #[arg(long)]
        close: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List deals
    List {
        /// Filter terms (e.g. "stage=offre,negociation min=200000")
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        filter: Vec<String>,
        /// Sort key: created, name, amount, probability, stage
        #[arg(long)]
        sort: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Show a deal
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Modify deal fields
    Modify {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long, value_parser = parse_amount)]
        amount: Option<i64>,
        #[arg(long, value_parser = parse_probability)]
        probability: Option<i64>,
        #[arg(long)]
        close: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Delete a deal
    Delete { id: String },
    /// Move a deal to another stage
    Move {
        id: String,
        /// Target stage, or the id of a card already in the target column
        target: String,
    },
    /// Export deals as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(long, short = 'o')]
        output: Option<std::path::PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ActivityCommands {
    /// Plan an activity
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        /// appel, email, rendez_vous, visite, tache
        #[arg(long = "type", default_value = "appel")]
        activity_type: String,
        /// basse, normale, haute, urgente
        #[arg(long, default_value = "normale")]
        priority: String,
        /// Due date (e.g. 2026-03-10T14:30, demain, +3d)
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        deal: Option<String>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List activities
    List {
        #[arg(long)]
        contact: Option<String>,
        #[arg(long)]
        deal: Option<String>,
        /// Only planned activities, soonest first
        #[arg(long)]
        upcoming: bool,
        #[arg(long)]
        json: bool,
    },
    /// Mark an activity done
    Done { id: String },
    /// Delete an activity
    Delete { id: String },
}

#[derive(Subcommand)]
pub enum TemplateCommands {
    /// Add an email template
    Add {
        name: String,
        #[arg(long)]
        subject: String,
        /// Body with {{prenom}}, {{nom}}, {{email}}, {{telephone}}, {{agence}} placeholders
        #[arg(long, default_value = "")]
        body: String,
        /// Draft the body with the configured generator when --body is empty
        #[arg(long)]
        generate: Option<String>,
    },
    /// List templates
    List {
        #[arg(long)]
        json: bool,
    },
    /// Render a template for a contact
    Render {
        name: String,
        /// Contact id (or unique prefix)
        #[arg(long)]
        contact: String,
        /// Extra variables (key=value)
        #[arg(long = "var")]
        vars: Vec<String>,
    },
    /// Change a template
    Modify {
        name: String,
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
    },
    /// Delete a template
    Delete { name: String },
}

#[derive(Subcommand)]
pub enum BoardCommands {
    /// Contact pipeline
    Contacts {
        #[arg(long)]
        json: bool,
    },
    /// Deal pipeline with per-stage totals
    Deals {
        #[arg(long)]
        json: bool,
    },
}

/// Everything a command needs: config, backend and the notification sink
pub struct App {
    pub config: Config,
    pub backend: SqliteBackend,
    pub notifier: TerminalNotifier,
}

impl App {
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        let backend = DbConnection::backend(&config).context("Failed to connect to database")?;
        Ok(Self {
            config,
            backend,
            notifier: TerminalNotifier { quiet: true },
        })
    }

    pub fn session(&self) -> Session {
        self.config
            .session()
            .unwrap_or_else(|| user_error("Not logged in. Run 'immocrm login <user>' first."))
    }

    pub fn accessor(&self) -> TenantAccessor<'_, &SqliteBackend> {
        TenantAccessor::new(self.session(), &self.backend, &self.notifier)
    }

    /// Accessor without a tenant, for the organization commands
    fn user_accessor(&self) -> TenantAccessor<'_, &SqliteBackend> {
        let session = self.session();
        TenantAccessor::new(Session::new(session.auth().clone(), None), &self.backend, &self.notifier)
    }
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    handle_command(cli)
}

fn handle_command(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login { user } => handle_login(user),
        Commands::Logout => handle_logout(),
        Commands::Whoami => handle_whoami(),
        Commands::Org { subcommand } => handle_org(subcommand),
        Commands::Contacts { subcommand } => handle_contacts(&App::open()?, subcommand),
        Commands::Deals { subcommand } => handle_deals(&App::open()?, subcommand),
        Commands::Activities { subcommand } => handle_activities(&App::open()?, subcommand),
        Commands::Templates { subcommand } => handle_templates(&App::open()?, subcommand),
        Commands::Board { subcommand } => handle_board(&App::open()?, subcommand),
    }
}

fn handle_login(user: String) -> Result<()> {
    if let Err(e) = validate_non_empty(&user, "User") {
        user_error(&e);
    }
    let mut app = App::open()?;
    let user = user.trim().to_string();
    app.config.set(SESSION_USER, &user);
    app.config.unset(SESSION_ORGANIZATION);

    // A single membership is selected right away
    let acc = TenantAccessor::new(Session::new(AuthContext::new(&user), None), &app.backend, &app.notifier);
    let orgs = OrganizationRepo::list_for_user(&acc)?;
    let selected = match orgs.as_slice() {
        [only] => Some(only.clone()),
        _ => None,
    };
    if let Some(org) = &selected {
        app.config.set(SESSION_ORGANIZATION, org.id.as_str());
    }
    app.config.save()?;

    println!("Logged in as {}", user);
    match selected {
        Some(org) => println!("Organization: {}", org.name),
        None if orgs.is_empty() => println!("No organization yet. Create one with 'immocrm org create <name>'."),
        None => println!("Select an organization with 'immocrm org use <id>'."),
    }
    Ok(())
}

fn handle_logout() -> Result<()> {
    let mut config = Config::load()?;
    config.unset(SESSION_USER);
    config.unset(SESSION_ORGANIZATION);
    config.save()?;
    println!("Logged out");
    Ok(())
}

fn handle_whoami() -> Result<()> {
    let app = App::open()?;
    let session = app.session();
    println!("User: {}", session.auth().user_id);
    match session.tenant() {
        Ok(tenant) => {
            let org = OrganizationRepo::get(&app.user_accessor(), tenant)?;
            println!("Organization: {} ({})", org.name, org.id);
        }
        Err(_) => println!("Organization: (none)"),
    }
    Ok(())
}

fn handle_org(cmd: OrgCommands) -> Result<()> {
    let mut app = App::open()?;
    match cmd {
        OrgCommands::Create { name } => {
            let name = name.join(" ");
            if let Err(e) = validate_non_empty(&name, "Organization name") {
                user_error(&e);
            }
            let org = OrganizationRepo::create(&app.user_accessor(), &name)?;
            app.config.set(SESSION_ORGANIZATION, org.id.as_str());
            app.config.save()?;
            println!("Created organization '{}' (id: {})", org.name, org.id);
            Ok(())
        }
        OrgCommands::List { json } => {
            let orgs = OrganizationRepo::list_for_user(&app.user_accessor())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&orgs)?);
            } else if orgs.is_empty() {
                println!("No organizations found.");
            } else {
                let session = app.session();
                print!("{}", format_organization_table(&orgs, session.tenant().ok()));
            }
            Ok(())
        }
        OrgCommands::Use { id } => {
            let acc = app.user_accessor();
            let tenant = OrganizationRepo::resolve_id(&acc, &id)?;
            let org = OrganizationRepo::get(&acc, &tenant)?;
            app.config.set(SESSION_ORGANIZATION, org.id.as_str());
            app.config.save()?;
            println!("Switched to organization '{}'", org.name);
            Ok(())
        }
        OrgCommands::Members { json } => {
            let acc = app.accessor();
            let tenant = acc.tenant()?.clone();
            let members = OrganizationRepo::members(&acc, &tenant)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&members)?);
            } else {
                print!("{}", format_member_table(&members));
            }
            Ok(())
        }
        OrgCommands::AddMember { user } => {
            let acc = app.accessor();
            let tenant = acc.tenant()?.clone();
            let member = OrganizationRepo::add_member(&acc, &tenant, &user)?;
            println!("Added {} as {}", member.user_id, member.role.as_str());
            Ok(())
        }
    }
}

fn handle_activities(app: &App, cmd: ActivityCommands) -> Result<()> {
    let acc = app.accessor();
    match cmd {
        ActivityCommands::Add {
            title,
            activity_type,
            priority,
            due,
            contact,
            deal,
            notes,
        } => {
            let activity_type = parse_choice(&activity_type, "activity type", ActivityType::ALL, ActivityType::as_str)
                .unwrap_or_else(|e| user_error(&e));
            let priority =
                parse_choice(&priority, "priority", Priority::ALL, Priority::as_str).unwrap_or_else(|e| user_error(&e));
            let mut form = NewActivity::new(title.join(" "), activity_type);
            form.priority = priority;
            form.due_ts = due.as_deref().map(parse_date_expr).transpose()?;
            form.contact_id = contact.map(|c| ContactRepo::resolve_id(&acc, &c)).transpose()?;
            form.deal_id = deal.map(|d| DealRepo::resolve_id(&acc, &d)).transpose()?;
            form.notes = notes;
            let activity = ActivityRepo::create(&acc, form)?;
            println!("Planned {} '{}' (id: {})", activity.activity_type.as_str(), activity.title, short_id(&activity.id));
            Ok(())
        }
        ActivityCommands::List {
            contact,
            deal,
            upcoming,
            json,
        } => {
            let activities = if let Some(contact) = contact {
                ActivityRepo::list_for_contact(&acc, &ContactRepo::resolve_id(&acc, &contact)?)?
            } else if let Some(deal) = deal {
                ActivityRepo::list_for_deal(&acc, &DealRepo::resolve_id(&acc, &deal)?)?
            } else if upcoming {
                ActivityRepo::upcoming(&acc, None)?
            } else {
                ActivityRepo::list(&acc, None)?
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&activities)?);
            } else if activities.is_empty() {
                println!("No activities found.");
            } else {
                let now = chrono::Utc::now().timestamp();
                print!("{}", format_activity_table(&activities, now, is_tty()));
            }
            Ok(())
        }
        ActivityCommands::Done { id } => {
            let id = ActivityRepo::resolve_id(&acc, &id)?;
            let activity = ActivityRepo::complete(&acc, &id)?;
            println!("Completed '{}'", activity.title);
            Ok(())
        }
        ActivityCommands::Delete { id } => {
            let id = ActivityRepo::resolve_id(&acc, &id)?;
            ActivityRepo::delete(&acc, &id)?;
            println!("Deleted activity {}", short_id(&id));
            Ok(())
        }
    }
}

fn handle_templates(app: &App, cmd: TemplateCommands) -> Result<()> {
    let acc = app.accessor();
    match cmd {
        TemplateCommands::Add {
            name,
            subject,
            mut body,
            generate,
        } => {
            if let Some(prompt) = generate {
                let Some(command) = app.config.get(COMPOSE_COMMAND) else {
                    user_error("No generator configured. Set compose.command in ~/.immocrm/rc.");
                };
                let generator = CommandGenerator::new(command);
                prefill_body(&generator, &prompt, &mut body, &app.notifier);
            }
            let template = TemplateRepo::create(&acc, NewTemplate { name, subject, body })?;
            println!("Created template '{}'", template.name);
            Ok(())
        }
        TemplateCommands::List { json } => {
            let templates = TemplateRepo::list(&acc)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&templates)?);
            } else if templates.is_empty() {
                println!("No templates found.");
            } else {
                print!("{}", format_template_table(&templates));
            }
            Ok(())
        }
        TemplateCommands::Render { name, contact, vars } => {
            let template = TemplateRepo::get_by_name(&acc, &name)?;
            let contact = ContactRepo::get(&acc, &ContactRepo::resolve_id(&acc, &contact)?)?;
            let org = OrganizationRepo::get(&acc, acc.tenant()?)?;

            let mut values = TemplateVars::for_contact(&contact);
            values.set("agence", &org.name);
            for pair in &vars {
                let Some((key, value)) = pair.split_once('=') else {
                    user_error(&format!("Invalid variable '{}'. Use key=value.", pair));
                };
                values.set(key.trim(), value);
            }
            let rendered = template.render(&values);
            println!("Subject: {}\n\n{}", rendered.subject, rendered.body);
            Ok(())
        }
        TemplateCommands::Modify { name, subject, body } => {
            let template = TemplateRepo::get_by_name(&acc, &name)?;
            let patch = TemplatePatch {
                name: None,
                subject,
                body,
            };
            TemplateRepo::update(&acc, &template.id, &patch)?;
            println!("Modified template '{}'", template.name);
            Ok(())
        }
        TemplateCommands::Delete { name } => {
            let template = TemplateRepo::get_by_name(&acc, &name)?;
            TemplateRepo::delete(&acc, &template.id)?;
            println!("Deleted template '{}'", template.name);
            Ok(())
        }
    }
}
