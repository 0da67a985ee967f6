//! JSONPrune CLI
//!
//! CLI tool for trying pruning rules against captured JSON documents.

mod io;

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use jp_compiler::{
    compile_rule, parse_paths, parse_rule_file, parse_scriptlet_filters, Pruner, RequestInfo,
    ScriptletKind,
};
use jp_core::{find_targets, normalized_path, CompiledRule, PathDescriptor, Segment};

use crate::io::{read_json, read_text, write_json};

#[derive(Parser)]
#[command(name = "jp-cli")]
#[command(about = "JSONPrune rule authoring tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prune a JSON document
    Prune {
        /// Input JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Prune paths (space separated)
        #[arg(short, long, default_value = "")]
        paths: String,

        /// Required paths (space separated)
        #[arg(short, long, default_value = "")]
        required: String,

        /// Stack pattern (substring or /regex/)
        #[arg(long, default_value = "")]
        stack_pattern: String,

        /// File holding the captured stack trace
        #[arg(long)]
        stack_trace: Option<PathBuf>,

        /// JSON rule file, applied after --paths
        #[arg(long)]
        rules: Option<PathBuf>,

        /// Filter list with scriptlet filters, applied after --rules
        #[arg(long)]
        filters: Option<PathBuf>,

        /// Hostname used to select filter list rules
        #[arg(long, default_value = "")]
        host: String,

        /// Scriptlet whose filters are applied
        #[arg(long, default_value = "json-prune")]
        scriptlet: String,

        /// Request URL matched against response rule constraints
        #[arg(long, default_value = "")]
        url: String,

        /// Request method matched against response rule constraints
        #[arg(long, default_value = "GET")]
        method: String,

        /// Intercepted function for trusted-prune-inbound-object filters
        #[arg(long)]
        function: Option<String>,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show how a path string is parsed
    Parse {
        /// Path string
        paths: String,

        /// Print descriptors as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the locations a path string would remove
    Find {
        /// Input JSON document
        #[arg(short, long)]
        input: PathBuf,

        /// Path string
        #[arg(short, long)]
        paths: String,
    },

    /// List the scriptlet filters of a filter list that apply to a host
    Rules {
        /// Filter list file
        #[arg(short, long)]
        input: PathBuf,

        /// Hostname (all rules when omitted)
        #[arg(long)]
        host: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Prune {
            input,
            paths,
            required,
            stack_pattern,
            stack_trace,
            rules,
            filters,
            host,
            scriptlet,
            url,
            method,
            function,
            output,
            verbose,
        } => {
            let opts = PruneOptions {
                paths,
                required,
                stack_pattern,
                stack_trace,
                rules,
                filters,
                host,
                scriptlet,
                url,
                method,
                function,
                verbose,
            };
            cmd_prune(&input, &opts, output.as_deref())
        }
        Commands::Parse { paths, json } => cmd_parse(&paths, json),
        Commands::Find { input, paths } => cmd_find(&input, &paths),
        Commands::Rules { input, host } => cmd_rules(&input, host.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

struct PruneOptions {
    paths: String,
    required: String,
    stack_pattern: String,
    stack_trace: Option<PathBuf>,
    rules: Option<PathBuf>,
    filters: Option<PathBuf>,
    host: String,
    scriptlet: String,
    url: String,
    method: String,
    function: Option<String>,
    verbose: bool,
}

fn collect_rules(opts: &PruneOptions) -> Result<Vec<CompiledRule>, String> {
    let mut rules = Vec::new();

    if !opts.paths.trim().is_empty() {
        rules.push(compile_rule(&opts.paths, &opts.required, &opts.stack_pattern));
    }

    if let Some(path) = &opts.rules {
        let text = read_text(path)?;
        let from_file = parse_rule_file(&text)
            .map_err(|e| format!("Failed to load '{}': {}", path.display(), e))?;
        rules.extend(from_file);
    }

    if let Some(path) = &opts.filters {
        let kind = ScriptletKind::from_name(&opts.scriptlet)
            .ok_or_else(|| format!("Unknown scriptlet '{}'", opts.scriptlet))?;
        let set = parse_scriptlet_filters(&read_text(path)?);
        let request = RequestInfo {
            url: &opts.url,
            method: &opts.method,
        };
        rules.extend(
            set.for_host(&opts.host, kind)
                .filter(|r| r.matches_request(&request))
                .filter(|r| opts.function.as_deref().map_or(true, |f| r.targets_function(f)))
                .map(|r| r.rule.clone()),
        );
    }

    Ok(rules)
}

fn cmd_prune(input: &Path, opts: &PruneOptions, output: Option<&Path>) -> Result<(), String> {
    let start = Instant::now();
    let rules = collect_rules(opts)?;
    if rules.is_empty() {
        return Err("No rules specified (use --paths, --rules or --filters)".to_string());
    }

    let stack_trace = match &opts.stack_trace {
        Some(path) => read_text(path)?,
        None => String::new(),
    };

    let mut value = read_json(input)?;
    let pruner: Pruner = Pruner::default().with_hostname(opts.host.as_str());
    let mut applied = 0usize;

    for (i, rule) in rules.iter().enumerate() {
        let outcome = pruner.apply(value, rule, &stack_trace);
        value = outcome.value;
        if outcome.changed {
            applied += 1;
        }
        if opts.verbose {
            eprintln!(
                "  [{}] {} prune path(s), {} required - {}",
                i,
                rule.prune_paths.len(),
                rule.required_paths.len(),
                if outcome.changed { "pruned" } else { "no change" }
            );
        }
    }

    write_json(output, &value)?;

    if opts.verbose {
        eprintln!(
            "Applied {} of {} rule(s) in {:.1}ms",
            applied,
            rules.len(),
            start.elapsed().as_secs_f64() * 1000.0
        );
    }

    Ok(())
}

fn cmd_parse(paths: &str, json: bool) -> Result<(), String> {
    let descriptors = parse_paths(paths);

    if json {
        let text = serde_json::to_string_pretty(&descriptors)
            .map_err(|e| format!("Failed to serialize descriptors: {}", e))?;
        println!("{}", text);
        return Ok(());
    }

    for (i, descriptor) in descriptors.iter().enumerate() {
        println!("  [{}] {}", i, describe(descriptor)?);
    }
    println!();
    println!("Paths:         {}", descriptors.len());
    Ok(())
}

/// One segment per token, `|` between tokens so literal dots stay visible.
fn describe(descriptor: &PathDescriptor) -> Result<String, String> {
    let mut text = descriptor
        .segments
        .iter()
        .map(Segment::as_token)
        .collect::<Vec<_>>()
        .join(" | ");
    if let Some(value) = &descriptor.match_value {
        let payload = serde_json::to_string(value)
            .map_err(|e| format!("Failed to serialize payload: {}", e))?;
        text.push_str(&format!(" => {}", payload));
    }
    Ok(text)
}

fn cmd_find(input: &Path, paths: &str) -> Result<(), String> {
    let value = read_json(input)?;
    let descriptors = parse_paths(paths);
    if descriptors.is_empty() {
        return Err("No paths specified".to_string());
    }

    let mut total = 0usize;
    for descriptor in &descriptors {
        for location in find_targets(&value, descriptor) {
            println!("{}", normalized_path(&location));
            total += 1;
        }
    }
    eprintln!("{} location(s)", total);
    Ok(())
}

fn cmd_rules(input: &Path, host: Option<&str>) -> Result<(), String> {
    let set = parse_scriptlet_filters(&read_text(input)?);

    let mut shown = 0usize;
    for rule in set.rules() {
        if host.is_some_and(|h| !rule.applies_to(h)) {
            continue;
        }
        println!("{}({})", rule.kind.name(), rule.args.join(", "));
        shown += 1;
    }

    println!();
    println!("Rules:");
    println!("  Total:       {}", set.len());
    println!("  Shown:       {}", shown);
    Ok(())
}
