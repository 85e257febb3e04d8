use anyhow::Result;
use rustyline::error::ReadlineError;
use rustyline::{history::DefaultHistory, CompletionType, Config, Editor};
use sql_completer::{CompleterSettings, MetadataSnapshot, SqlCompleter, SqlHelper};
use std::path::PathBuf;
use tracing::{debug, warn};

pub struct Cli {
    editor: Editor<SqlHelper, DefaultHistory>,
    schema: Option<PathBuf>,
    history: Option<PathBuf>,
}

impl Cli {
    pub fn new(
        settings: CompleterSettings,
        schema: Option<PathBuf>,
        history: Option<PathBuf>,
    ) -> Result<Self> {
        println!("Welcome to the SQL completion prompt. Press Tab to complete.");
        println!("Type '\\h' for help. Statements are recorded, never executed.");
        println!();

        let config = Config::builder()
            .completion_type(CompletionType::List)
            .auto_add_history(false)
            .edit_mode(rustyline::EditMode::Emacs)
            .build();
        let mut editor: Editor<SqlHelper, DefaultHistory> = Editor::with_config(config)?;

        let mut completer = SqlCompleter::new(settings)?;
        if let Some(path) = &schema {
            completer.metadata_mut().apply(MetadataSnapshot::load(path)?);
        }

        if let Some(path) = &history {
            // A missing history file just means a fresh start
            if let Err(e) = editor.load_history(path) {
                debug!(path = %path.display(), error = %e, "no history loaded");
            }
        }
        let entries = recorded_statements(editor.history().iter());
        completer.init_from_history(&entries);

        editor.set_helper(Some(SqlHelper::new(completer)));

        Ok(Self {
            editor,
            schema,
            history,
        })
    }

    pub fn run(&mut self) -> Result<()> {
        loop {
            let prompt = self.prompt();
            let readline = self.editor.readline(prompt);
            match readline {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if is_special_command(line) {
                        match self.handle_special_command(line) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(e) => println!("Error: {}", e),
                        }
                        continue;
                    }

                    self.editor.add_history_entry(line)?;
                    if let Some(helper) = self.editor.helper_mut() {
                        helper.completer_mut().extend_query_history(line, false);
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => {
                    println!("Bye");
                    break;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    break;
                }
            }
        }
        self.save_history();
        Ok(())
    }

    fn prompt(&self) -> &'static str {
        match self.editor.helper() {
            Some(helper) if !helper.completer().settings().smart_completion => "sql (plain)> ",
            _ => "sql> ",
        }
    }

    /// Returns `true` when the prompt should exit
    fn handle_special_command(&mut self, command: &str) -> Result<bool> {
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((command, ""));
        match name {
            "\\q" | "\\quit" | "\\exit" => {
                println!("Bye");
                return Ok(true);
            }
            "\\h" | "\\help" => self.show_help(),
            "\\refresh" => self.refresh()?,
            "\\smart" => {
                if let Some(helper) = self.editor.helper_mut() {
                    let enabled = !helper.completer().settings().smart_completion;
                    helper.completer_mut().set_smart_completion(enabled);
                    println!(
                        "Smart completion {}",
                        if enabled { "enabled" } else { "disabled" }
                    );
                }
            }
            "\\explain" => self.explain(arg),
            "\\s" | "\\status" => self.show_status(),
            _ => {
                println!("Unknown command: {}", command);
                println!("Type '\\h' for help.");
            }
        }
        Ok(false)
    }

    fn show_help(&self) {
        println!("Commands:");
        println!();
        println!("\\explain <sql>  Show what may follow the end of <sql>.");
        println!("\\h (\\help)      Display this help.");
        println!("\\q (\\quit)      Quit.");
        println!("\\refresh        Reload the metadata snapshot.");
        println!("\\s (\\status)    Show completion settings and metadata counts.");
        println!("\\smart          Toggle smart completion.");
        println!();
        println!("Any other line is added to the history and used to rank candidates.");
        println!();
    }

    fn refresh(&mut self) -> Result<()> {
        let Some(path) = &self.schema else {
            println!("No metadata snapshot given (use --schema).");
            return Ok(());
        };
        let snapshot = MetadataSnapshot::load(path)?;
        if let Some(helper) = self.editor.helper_mut() {
            helper.completer_mut().metadata_mut().apply(snapshot);
        }
        println!("Metadata reloaded from {}", path.display());
        Ok(())
    }

    fn explain(&self, sql: &str) {
        let Some(helper) = self.editor.helper() else {
            return;
        };
        let requests = helper.completer().suggest_type(sql, sql);
        if requests.is_empty() {
            println!("(nothing to suggest)");
        }
        for request in requests {
            println!("{:?}", request);
        }
    }

    fn show_status(&self) {
        let Some(helper) = self.editor.helper() else {
            return;
        };
        let completer = helper.completer();
        let settings = completer.settings();
        let metadata = completer.metadata();
        println!("--------------");
        println!("Smart completion:\t{}", settings.smart_completion);
        println!("Keyword casing:\t\t{}", settings.keyword_casing);
        println!("Qualify columns:\t{:?}", settings.qualify_columns);
        println!(
            "Metadata:\t\t{} tables, {} views, {} functions, {} procedures",
            metadata.tables().count(),
            metadata.views().count(),
            metadata.functions().len(),
            metadata.procedures().len()
        );
        match metadata.last_update() {
            Some(at) => println!("Last update:\t\t{:.1?} ago", at.elapsed()),
            None => println!("Last update:\t\tnever"),
        }
        println!(
            "Snapshot:\t\t{}",
            self.schema
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none)".to_string())
        );
        println!("--------------");
    }

    fn save_history(&mut self) {
        if let Some(path) = &self.history {
            if let Err(e) = self.editor.save_history(path) {
                warn!(path = %path.display(), error = %e, "failed to save history");
            }
        }
    }
}

fn is_special_command(line: &str) -> bool {
    line.starts_with('\\')
}

/// History entries that are SQL statements, oldest first
fn recorded_statements<'h>(history: impl Iterator<Item = &'h String>) -> Vec<String> {
    history
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty() && !is_special_command(entry))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_commands_are_not_statements() {
        assert!(is_special_command("\\explain SELECT * FROM t"));
        assert!(is_special_command("\\q"));
        assert!(!is_special_command("SELECT 1"));
    }

    #[test]
    fn test_seeding_skips_special_commands() {
        let history: Vec<String> = vec![
            "SELECT * FROM orders".to_string(),
            "\\explain SELECT * FROM orders WHERE ".to_string(),
            "\\smart".to_string(),
            "  ".to_string(),
            "DELETE FROM orders".to_string(),
        ];
        assert_eq!(
            recorded_statements(history.iter()),
            vec!["SELECT * FROM orders", "DELETE FROM orders"]
        );
    }
}
