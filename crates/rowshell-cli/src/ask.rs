//! `rowshell ask`: one AI request about a local component file.

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use colored::Colorize;
use crate::sync::template_id_from_path;
use rowshell_model::{apply_unified_diff, extract_proposal, Proposal};
use rowshell_studio::{AiClient, AiConfig, AiMode, AiRequest, AiTransport, ComponentContext};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

#[derive(Args)]
pub struct AskArgs {
    /// Component file; the file name is the template id
    file: PathBuf,
    /// general, explain, refactor, fix or convert_tsx
    #[arg(short, long, default_value = "general")]
    mode: String,
    /// Prompt; quick modes default to their canned prompt
    #[arg(short, long)]
    prompt: Option<String>,
    /// Use the streaming endpoint
    #[arg(long)]
    stream: bool,
    /// Apply the proposal to the file
    #[arg(long)]
    write: bool,
}

/// Source type recorded for a file: `tsx` files are TSX, anything else JSX.
fn source_type_of(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("tsx") => "tsx",
        _ => "react",
    }
}

/// Text to print for a new accumulated reply, given what is already shown.
fn unseen_suffix<'a>(shown: &str, accumulated: &'a str) -> Option<&'a str> {
    accumulated.strip_prefix(shown)
}

pub async fn cmd_ask(args: AskArgs) -> Result<()> {
    let mode = AiMode::parse(&args.mode).ok_or_else(|| anyhow!("unknown mode `{}`", args.mode))?;
    let prompt = match (&args.prompt, mode.quick_prompt()) {
        (Some(prompt), _) => prompt.clone(),
        (None, Some(quick)) => quick.to_string(),
        (None, None) => bail!("--prompt is required for mode {}", mode.as_str()),
    };
    let code = fs::read_to_string(&args.file)
        .with_context(|| format!("reading {}", args.file.display()))?;

    let template_id = template_id_from_path(&args.file).unwrap_or_default();
    let request = AiRequest::new(
        mode,
        ComponentContext {
            name: template_id.clone(),
            source_type: source_type_of(&args.file).to_string(),
            code: code.clone(),
            template_id,
        },
        &[],
        &prompt,
    );

    let client = AiClient::new(AiConfig::from_env()?)?;
    let reply = if args.stream {
        let (progress, mut updates) = mpsc::unbounded_channel::<String>();
        let printer = tokio::spawn(async move {
            let mut shown = String::new();
            let mut stdout = std::io::stdout();
            while let Some(accumulated) = updates.recv().await {
                match unseen_suffix(&shown, &accumulated) {
                    Some(suffix) => print!("{suffix}"),
                    None => print!("\n{accumulated}"),
                }
                let _ = stdout.flush();
                shown = accumulated;
            }
            println!();
        });
        let reply = client.ask_stream(&request, progress).await;
        printer.await?;
        reply?
    } else {
        let reply = client.ask(&request).await?;
        println!("{reply}");
        reply
    };

    let Some(proposal) = extract_proposal(&reply) else {
        return Ok(());
    };
    let kind = match proposal {
        Proposal::Diff(_) => "diff",
        Proposal::Full(_) => "full file",
    };
    eprintln!("{} {}", "proposal:".yellow().bold(), kind);

    if args.write {
        let updated = match proposal {
            Proposal::Full(full) => full,
            Proposal::Diff(diff) => apply_unified_diff(&code, &diff).ok_or_else(|| {
                anyhow!("the diff does not apply to the current source; ask for the complete file instead")
            })?,
        };
        fs::write(&args.file, updated)
            .with_context(|| format!("writing {}", args.file.display()))?;
        eprintln!("{} {}", "wrote".green().bold(), args.file.display().to_string().bold());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tsx_files_are_tsx() {
        assert_eq!(source_type_of(Path::new("components/card.tsx")), "tsx");
        assert_eq!(source_type_of(Path::new("components/home")), "react");
    }

    #[test]
    fn streamed_text_prints_only_what_is_new() {
        assert_eq!(unseen_suffix("Bon", "Bonjour"), Some("jour"));
        assert_eq!(unseen_suffix("", "Bon"), Some("Bon"));
        assert_eq!(unseen_suffix("Bonjour", "Salut"), None);
    }
}
