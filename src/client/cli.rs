use std::{path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use crate::{
    config::AppConfig,
    db::{self, extract::extract_schema, sqlite::import_sql_script, DbClient},
    er::render_er_diagram,
    errors::{DbError, RagError},
    executor::{execution_message, export_csv, QueryExecutor},
    models::{connections::{ConnectionConfig, DbType}, results::QueryResult},
    pipeline::{AppContext, GenerationMode, Session},
};

use super::render::{result_table, retrieved_table, schema_table};

#[derive(Parser)]
#[command(name = "sqlrag")]
#[command(about = "Ask a relational database questions in plain language")]
#[command(version)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the extracted schema
    Schema {
        #[command(flatten)]
        db: DbArgs,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Print a Graphviz ER diagram of the schema
    Er {
        #[command(flatten)]
        db: DbArgs,
        /// Write the DOT text here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Build (or reuse) the schema index
    Index {
        #[command(flatten)]
        db: DbArgs,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Translate a question into SQL and run it
    Ask {
        #[command(flatten)]
        db: DbArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// Natural-language question
        question: String,
        #[arg(long, value_enum, default_value_t = ModeArg::Rag)]
        mode: ModeArg,
        /// Only print the generated SQL
        #[arg(long)]
        no_execute: bool,
        /// Export the result rows to this CSV file
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run SQL directly
    Exec {
        #[command(flatten)]
        db: DbArgs,
        sql: String,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Load a `.sql` script into a SQLite database file
    ImportSql {
        script: PathBuf,
        db_file: PathBuf,
    },
}

#[derive(Args)]
pub struct DbArgs {
    /// SQLite file, `.sql` script, or database URL
    #[arg(short, long, env = "SQLRAG_DATABASE", required_unless_present = "host")]
    pub database: Option<String>,
    #[arg(long, value_enum, default_value_t = EngineArg::Postgres)]
    pub engine: EngineArg,
    #[arg(long, conflicts_with = "database")]
    pub host: Option<String>,
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long, default_value = "")]
    pub user: String,
    #[arg(long, env = "SQLRAG_DB_PASSWORD", hide_env_values = true, default_value = "")]
    pub password: String,
    #[arg(long, default_value = "")]
    pub dbname: String,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum EngineArg {
    Postgres,
    Mysql,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    Rag,
    SchemaOnly,
}

impl From<ModeArg> for GenerationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Rag => GenerationMode::Rag,
            ModeArg::SchemaOnly => GenerationMode::SchemaOnly,
        }
    }
}

#[derive(Args)]
pub struct ModelArgs {
    /// Generation model (overrides SQLRAG_MODEL)
    #[arg(long)]
    pub model: Option<String>,
    /// Number of retrieved columns (overrides SQLRAG_TOP_K)
    #[arg(long)]
    pub top_k: Option<usize>,
    /// Schema index artifact (overrides SQLRAG_INDEX_PATH)
    #[arg(long)]
    pub index_path: Option<PathBuf>,
}

impl DbArgs {
    pub fn connection_config(&self) -> Result<ConnectionConfig, DbError> {
        match (&self.database, &self.host) {
            (Some(source), _) => ConnectionConfig::parse(source),
            (None, Some(host)) => {
                let db_type = match self.engine {
                    EngineArg::Postgres => DbType::Postgres,
                    EngineArg::Mysql => DbType::MySql,
                };
                ConnectionConfig::network(
                    db_type,
                    host,
                    self.port,
                    &self.user,
                    &self.password,
                    &self.dbname,
                )
            }
            (None, None) => Err(DbError::Config(
                "either --database or --host is required".to_string(),
            )),
        }
    }

    async fn connect(&self) -> Result<Arc<dyn DbClient>, DbError> {
        db::connect(&self.connection_config()?).await
    }
}

impl ModelArgs {
    fn app_config(&self) -> Result<AppConfig, RagError> {
        let mut config = AppConfig::from_env()?;
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(top_k) = self.top_k {
            if top_k == 0 {
                return Err(RagError::Config("--top-k must be positive".to_string()));
            }
            config.top_k = top_k;
        }
        if let Some(path) = &self.index_path {
            config.index_path = path.clone();
        }
        Ok(config)
    }

    async fn session(&self, db: &DbArgs) -> Result<Session, RagError> {
        let ctx = Arc::new(AppContext::from_config(&self.app_config()?)?);
        Ok(Session::open(ctx, db.connect().await?).await?)
    }
}

fn print_result(result: &QueryResult, csv: Option<&PathBuf>) -> Result<(), DbError> {
    if result.columns.is_empty() {
        println!("Statement executed, no rows returned.");
    } else {
        println!("{}", result_table(result));
        println!("{} row(s)", result.row_count());
    }

    if let Some(path) = csv {
        export_csv(result, path)?;
        println!("Saved results to {}", path.display());
    }
    Ok(())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String, RagError> {
    serde_json::to_string_pretty(value).map_err(|e| DbError::Export(e.to_string()).into())
}

impl Cli {
    pub async fn run(self) -> Result<(), RagError> {
        match self.command {
            Commands::Schema { db, json } => {
                let schema = extract_schema(db.connect().await?.as_ref()).await?;
                if json {
                    println!("{}", to_json(&schema)?);
                } else if schema.is_empty() {
                    println!("(no tables)");
                } else {
                    println!("{}", schema_table(&schema));
                }
            }
            Commands::Er { db, output } => {
                let schema = extract_schema(db.connect().await?.as_ref()).await?;
                let dot = render_er_diagram(&schema);
                match output {
                    Some(path) => {
                        std::fs::write(&path, dot)
                            .map_err(|e| DbError::Export(format!("{}: {e}", path.display())))?;
                        info!("Wrote ER diagram to {}", path.display());
                    }
                    None => print!("{dot}"),
                }
            }
            Commands::Index { db, model } => {
                let mut session = model.session(&db).await?;
                let index = session.ensure_index().await?;
                println!(
                    "Schema index: {} descriptors, model {}, built {}",
                    index.len(),
                    index.embedding_model(),
                    index.built_at().to_rfc3339()
                );
            }
            Commands::Ask {
                db,
                model,
                question,
                mode,
                no_execute,
                csv,
                json,
            } => {
                let mut session = model.session(&db).await?;
                let answer = session.ask(&question, mode.into(), !no_execute).await?;

                if json {
                    println!("{}", to_json(&answer)?);
                    return Ok(());
                }

                if !answer.retrieved.is_empty() {
                    println!("{}", retrieved_table(&answer.retrieved));
                }
                println!("{}", answer.sql);

                match &answer.outcome {
                    Some(Ok(result)) => print_result(result, csv.as_ref())?,
                    Some(Err(message)) => println!("{message}"),
                    None => {}
                }
            }
            Commands::Exec { db, sql, csv } => {
                let client = db.connect().await?;
                match QueryExecutor::new(client.as_ref()).run(&sql).await {
                    Ok(result) => print_result(&result, csv.as_ref())?,
                    Err(e) => println!("{}", execution_message(&e)),
                }
            }
            Commands::ImportSql { script, db_file } => {
                import_sql_script(&script.to_string_lossy(), &db_file.to_string_lossy()).await?;
                println!("Imported {} into {}", script.display(), db_file.display());
            }
        }

        Ok(())
    }
}
