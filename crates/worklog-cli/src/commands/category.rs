use clap::Subcommand;
use worklog_core::{CategoryUpdate, Config, Database, NewCategory, Store, ValidationError};

use super::{find_category, CliResult};

#[derive(Subcommand)]
pub enum CategoryAction {
    /// Create a category
    Add {
        /// Display name
        name: String,
        /// Hex color such as #3b82f6 (defaults to categories.default_color)
        #[arg(long)]
        color: Option<String>,
    },
    /// List categories as JSON, oldest first
    List,
    /// Rename or recolor a category
    Edit {
        /// Category id or name
        category: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        color: Option<String>,
    },
    /// Delete a category together with its sessions
    Rm {
        /// Category id or name
        category: String,
    },
}

pub fn run(action: CategoryAction) -> CliResult {
    let db = Database::open()?;

    match action {
        CategoryAction::Add { name, color } => {
            let color = match color {
                Some(color) => color,
                None => Config::load_or_default().categories.default_color,
            };
            let category = db.create_category(NewCategory::new(&name, &color)?)?;
            println!("{}", serde_json::to_string_pretty(&category)?);
        }
        CategoryAction::List => {
            let categories = db.list_categories()?;
            println!("{}", serde_json::to_string_pretty(&categories)?);
        }
        CategoryAction::Edit {
            category,
            name,
            color,
        } => {
            let update = CategoryUpdate::new(name.as_deref(), color.as_deref())?;
            if update.is_empty() {
                return Err(ValidationError::InvalidValue {
                    field: "category".into(),
                    message: "nothing to change; pass --name or --color".into(),
                }
                .into());
            }
            let existing = find_category(&db, &category)?;
            let updated = db.update_category(&existing.id, update)?;
            println!("{}", serde_json::to_string_pretty(&updated)?);
        }
        CategoryAction::Rm { category } => {
            let existing = find_category(&db, &category)?;
            db.delete_category(&existing.id)?;
            println!(
                "{}",
                serde_json::json!({ "type": "category_deleted", "id": existing.id })
            );
        }
    }
    Ok(())
}
