//! extcss command-line tool
//!
//! Inspect how extended selectors parse, check them against a page, and dry
//! run a rule list over a page described in JSON (see [`page`]).
//!
//! Set `RUST_LOG=extcss=debug` to see the engine's own diagnostics.

mod page;
mod view;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use extcss::ast::builder::build;
use extcss::engine::effects::element_path;
use extcss::{EventLoop, ExtCss, ExtCssConfig, RuleInput, Ticket};
use extcss_dom::{DomTree, NodeId, UserAgent};

use view::{AstView, Palette, TreeView};

/// extcss: extended CSS selector inspector
#[derive(Parser, Debug)]
#[command(name = "extcss")]
#[command(author, version, about, long_about = None)]
#[command(after_help = r#"EXAMPLES:
    # Print the optimized AST of a selector
    extcss parse 'div:has(> a:contains(Sponsored))'

    # Print the AST before optimization, as JSON
    extcss parse --raw --json 'div:not(.a):matches-css(display: block)'

    # Check several selectors at once
    extcss validate 'div:nth-ancestor(2)' 'p:upward(0)'

    # Select elements of a page
    extcss query --doc page.json 'div:matches-attr("/data-/")'

    # Apply a rule list to a page and show what changed
    extcss apply --doc page.json --rules rules.json
"#)]
struct Cli {
    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse a selector and print its AST
    Parse {
        /// Selector text
        selector: String,

        /// Print the AST as JSON
        #[arg(long)]
        json: bool,

        /// Skip the optimizer
        #[arg(long)]
        raw: bool,
    },

    /// Check that selectors parse and evaluate
    Validate {
        /// Selector texts
        #[arg(required = true)]
        selectors: Vec<String>,

        /// Page to evaluate against (default: an empty body)
        #[arg(short, long, value_name = "FILE")]
        doc: Option<PathBuf>,
    },

    /// Print the elements a selector matches
    Query {
        /// Selector text
        selector: String,

        /// Page description (JSON)
        #[arg(short, long, value_name = "FILE")]
        doc: PathBuf,

        /// Report computed style the way Safari does
        #[arg(long)]
        safari: bool,
    },

    /// Run one engine cycle over a page
    Apply {
        /// Page description (JSON)
        #[arg(short, long, value_name = "FILE")]
        doc: PathBuf,

        /// Rule list (JSON array of `{ "selector", "declarations" }`)
        #[arg(short, long, value_name = "FILE")]
        rules: PathBuf,

        /// Report computed style the way Safari does
        #[arg(long)]
        safari: bool,
    },
}

/// Event loop for a single synchronous run; callbacks are never delivered.
struct OneShot {
    started: Instant,
}

impl EventLoop for OneShot {
    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn request_animation_frame(&mut self, ticket: Ticket) {
        log::debug!(target: "extcss", "frame {ticket:?} requested after exit");
    }

    fn set_timeout(&mut self, delay: Duration, ticket: Ticket) {
        log::debug!(target: "extcss", "timeout {ticket:?} of {delay:?} requested after exit");
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let palette = Palette::new(!cli.no_color);

    match cli.command {
        Command::Parse {
            selector,
            json,
            raw,
        } => parse(&selector, json, raw, palette),
        Command::Validate { selectors, doc } => validate(&selectors, doc.as_deref(), palette),
        Command::Query {
            selector,
            doc,
            safari,
        } => query(&selector, &doc, safari, palette),
        Command::Apply { doc, rules, safari } => apply(&doc, &rules, safari, palette),
    }
}

fn parse(selector: &str, json: bool, raw: bool, palette: Palette) -> Result<()> {
    let list = if raw { build(selector)? } else { extcss::parse(selector)? };
    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        println!("=== Selector ===");
        println!("{list}");
        println!("\n=== AST ===");
        print!("{}", AstView::new(&list, palette));
    }
    Ok(())
}

fn validate(selectors: &[String], doc: Option<&Path>, palette: Palette) -> Result<()> {
    let tree = match doc {
        Some(path) => load_page(path, false)?,
        None => page::blank(),
    };
    let mut failed = 0;
    for selector in selectors {
        match extcss::validate(&tree, selector) {
            Ok(()) => println!("{} {selector}", palette.hit("ok   ")),
            Err(error) => {
                failed += 1;
                println!("{} {selector}\n      {error}", palette.error("error"));
            }
        }
    }
    if failed > 0 {
        bail!("{failed} of {} selectors are invalid", selectors.len());
    }
    Ok(())
}

fn query(selector: &str, doc: &Path, safari: bool, palette: Palette) -> Result<()> {
    let tree = load_page(doc, safari)?;
    let started = Instant::now();
    let found = extcss::query(&tree, selector)?;
    let elapsed = started.elapsed();

    println!("=== Matches ===");
    for &node in &found {
        println!("{}", element_path(&tree, node));
    }
    println!("{} element(s) in {elapsed:?}", found.len());

    let marks: HashMap<NodeId, String> = found
        .iter()
        .enumerate()
        .map(|(index, &node)| (node, format!("#{}", index + 1)))
        .collect();
    println!("\n=== DOM Tree ===");
    print!("{}", TreeView::new(&tree, NodeId::ROOT, &marks, palette));
    Ok(())
}

fn apply(doc: &Path, rules: &Path, safari: bool, palette: Palette) -> Result<()> {
    let mut tree = load_page(doc, safari)?;
    let source = fs::read_to_string(rules)
        .with_context(|| format!("failed to read {}", rules.display()))?;
    let inputs: Vec<RuleInput> = serde_json::from_str(&source)
        .with_context(|| format!("{} is not a rule list", rules.display()))?;

    let mut engine = ExtCss::new(ExtCssConfig::<DomTree>::new(inputs))?;
    let mut host = OneShot {
        started: Instant::now(),
    };
    engine.apply(&mut tree, &mut host);

    println!("=== Rules ===");
    for rule in engine.rules() {
        let stats = rule.stats();
        println!(
            "{} {} match(es), {:?}",
            rule.selector(),
            stats.last_matches,
            stats.total
        );
    }

    let affected = engine.affected_elements(&tree);
    let mut marks = HashMap::new();
    let mut removed = Vec::new();
    for element in &affected {
        if element.removed {
            removed.push(element.path.as_str());
        } else {
            let declarations: Vec<String> = element
                .declarations
                .iter()
                .map(|declaration| format!("{}: {}", declaration.property, declaration.value))
                .collect();
            let _ = marks.insert(element.node, declarations.join("; "));
        }
    }

    println!("\n=== DOM Tree ===");
    print!("{}", TreeView::new(&tree, NodeId::ROOT, &marks, palette));

    if !removed.is_empty() {
        println!("\n=== Removed ===");
        for path in removed {
            println!("{}", palette.error(path));
        }
    }
    Ok(())
}

fn load_page(path: &Path, safari: bool) -> Result<DomTree> {
    let source =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mut tree =
        page::load(&source).with_context(|| format!("{} is not a page description", path.display()))?;
    if safari {
        tree.set_user_agent(UserAgent::Safari);
    }
    Ok(tree)
}
