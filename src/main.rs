//! 交互式过滤表达式控制台
//!
//! 输入一个过滤表达式，输出 AST 以及三种后端的查询形式。
//! 也可以直接把表达式作为命令行参数传入。

use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use query_filter::{parse, DocumentTranslator, FilterConfig, RelationalTranslator, SearchTranslator, Translator};

const CONFIG_FILE: &str = "filter_config.json";
const DEFAULT_TABLE: &str = "items";

struct Backends {
    relational: RelationalTranslator,
    document: DocumentTranslator,
    search: SearchTranslator,
}

impl Backends {
    fn new(config: FilterConfig) -> Self {
        Self {
            relational: RelationalTranslator::with_config(config.clone()),
            document: DocumentTranslator::with_config(config.clone()),
            search: SearchTranslator::with_config(config),
        }
    }
}

/// 优先使用JSON配置，失败时使用默认配置
fn load_config() -> FilterConfig {
    match FilterConfig::from_json_file(CONFIG_FILE) {
        Ok(config) => {
            tracing::info!(file = CONFIG_FILE, fields = config.field_mapping.len(), "loaded filter config");
            config
        }
        Err(e) => {
            tracing::warn!(error = %e, "using default filter config");
            FilterConfig::default()
        }
    }
}

fn run(backends: &Backends, input: &str) -> Result<()> {
    let expr = parse(input).with_context(|| format!("failed to parse {:?}", input))?;
    println!("[AST]\n{:#?}\n", expr);
    println!("[规范化]\n{}\n", expr);

    let sql = backends.relational.translate(&expr).context("relational translation failed")?;
    println!("[SQL]\n{}\n", sql.to_sql(DEFAULT_TABLE));

    let document = backends.document.translate(&expr).context("document translation failed")?;
    println!("[Document]\n{}\n", serde_json::to_string_pretty(&document)?);

    let search = backends.search.translate(&expr).context("search translation failed")?;
    println!("[Search]\n{}", serde_json::to_string_pretty(&search)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let backends = Backends::new(load_config());

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        return run(&backends, &args.join(" "));
    }

    println!("--- query_filter: 输入过滤表达式, Ctrl-D 退出 ---");
    let mut editor = DefaultEditor::new()?;
    loop {
        match editor.readline("filter> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                editor.add_history_entry(line)?;
                if let Err(e) = run(&backends, line) {
                    println!("✗ {:#}", e);
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}
