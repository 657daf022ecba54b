//! Modifier CLI
//!
//! CLI tool for managing rule stores and encrypted `.mrf` rule files.

mod manage;
mod store_file;
mod transfer;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use mr_core::Rule;

use crate::manage::RuleFields;

#[derive(Parser)]
#[command(name = "mr-cli")]
#[command(about = "Modifier rule store and rule file tools")]
struct Cli {
    /// Rule store file ({ rules, forceLoopEnabled })
    #[arg(short, long, global = true, default_value = "rules.json")]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct FieldArgs {
    /// Display name
    #[arg(long)]
    name: Option<String>,

    /// Page URL the rule applies to (exact match)
    #[arg(long)]
    url: Option<String>,

    /// CSS selector of the target element
    #[arg(long)]
    selector: Option<String>,

    /// Replacement HTML
    #[arg(long)]
    content: Option<String>,

    /// Text color override; empty string disables it
    #[arg(long)]
    color: Option<String>,

    /// immediate or onload
    #[arg(long)]
    timing: Option<String>,

    /// once or loop
    #[arg(long)]
    mode: Option<String>,
}

impl From<FieldArgs> for RuleFields {
    fn from(args: FieldArgs) -> Self {
        RuleFields {
            name: args.name,
            url: args.url,
            selector: args.selector,
            content: args.content,
            color: args.color,
            timing: args.timing,
            mode: args.mode,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Add a rule
    Add {
        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Change fields of an existing rule
    Edit {
        /// Rule id
        id: String,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// List rules
    List {
        /// Substring of name, URL or selector
        #[arg(long)]
        search: Option<String>,

        /// once or loop
        #[arg(long)]
        mode: Option<String>,

        /// active or inactive
        #[arg(long)]
        status: Option<String>,

        /// Only rules for this exact page URL
        #[arg(long)]
        url: Option<String>,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Enable rules by id
    Enable { ids: Vec<String> },

    /// Disable rules by id
    Disable { ids: Vec<String> },

    /// Delete rules by id
    Delete { ids: Vec<String> },

    /// Turn the force loop on or off
    ForceLoop { state: String },

    /// Export rules to an encrypted rule file
    Export {
        /// Output file (default: modifier-rules-YYYY-MM-DD.mrf)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only these rule ids
        #[arg(long = "id")]
        ids: Vec<String>,
    },

    /// Import a rule file, binding its rules to a page URL
    Import {
        /// Rule file (.mrf)
        #[arg(short, long)]
        input: PathBuf,

        /// Page URL the imported rules apply to
        #[arg(long)]
        url: String,
    },

    /// Show the contents of a rule file
    Inspect {
        /// Rule file (.mrf)
        #[arg(short, long)]
        input: PathBuf,

        /// Print JSON
        #[arg(long)]
        json: bool,
    },

    /// Check every rule in the store
    Validate,
}

fn main() {
    let cli = Cli::parse();
    let store = cli.store.as_path();

    let result = match cli.command {
        Commands::Add { fields } => {
            let id = Rule::generate_id(chrono::Utc::now().timestamp_millis().max(0) as u64);
            manage::cmd_add(store, id, fields.into()).map(|_| ())
        }
        Commands::Edit { id, fields } => manage::cmd_edit(store, &id, fields.into()),
        Commands::List {
            search,
            mode,
            status,
            url,
            json,
        } => manage::cmd_list(store, search, mode.as_deref(), status.as_deref(), url.as_deref(), json).map(|_| ()),
        Commands::Enable { ids } => manage::cmd_set_disabled(store, &ids, false),
        Commands::Disable { ids } => manage::cmd_set_disabled(store, &ids, true),
        Commands::Delete { ids } => manage::cmd_delete(store, &ids),
        Commands::ForceLoop { state } => manage::cmd_force_loop(store, &state),
        Commands::Export { output, ids } => {
            let date = chrono::Local::now().format("%Y-%m-%d").to_string();
            transfer::cmd_export(store, output.as_deref(), &ids, &date, rand::random()).map(|_| ())
        }
        Commands::Import { input, url } => {
            transfer::cmd_import(store, &input, &url, chrono::Utc::now().timestamp_millis().max(0) as u64)
        }
        Commands::Inspect { input, json } => transfer::cmd_inspect(&input, json),
        Commands::Validate => manage::cmd_validate(store),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
