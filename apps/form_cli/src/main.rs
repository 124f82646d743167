use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use client_core::{
    config::{load_settings, parse_api_base_url},
    DirectoryViewer, FormState, SubmissionController, SubmissionState,
};
use shared::domain::{QuestionId, QuestionKind, QUESTIONS};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Default)]
#[command(
    name = "wellness-form",
    about = "Fill in the wellness questionnaire and generate a PDF report"
)]
struct Args {
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value = "")]
    email: String,
    /// bom | regular | ruim
    #[arg(long)]
    sleep: Option<String>,
    /// Hours of physical activity per week
    #[arg(long = "activity-hours")]
    activity_hours: Option<String>,
    /// boa | regular | "precisa melhorar"
    #[arg(long)]
    diet: Option<String>,
    /// Daily stress level, 0 to 10
    #[arg(long)]
    stress: Option<String>,
    /// Answer by question id, e.g. --answer stress_level=4
    #[arg(long = "answer", value_name = "KEY=VALUE")]
    answers: Vec<String>,
    /// Image to embed in the report header
    #[arg(long)]
    logo: Option<PathBuf>,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    config: Option<PathBuf>,
    /// Open the saved report in the system viewer
    #[arg(long)]
    open: bool,
    /// Print the declared questions and exit
    #[arg(long)]
    list_questions: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    if args.list_questions {
        print_questions();
        return Ok(ExitCode::SUCCESS);
    }

    let mut settings = load_settings(args.config.as_deref()).context("failed to load settings")?;
    if let Some(raw) = &args.api_url {
        settings.api_base_url = parse_api_base_url(raw)?;
    }
    if let Some(dir) = &args.output_dir {
        settings.output_dir = dir.clone();
    }

    let form = build_form(&args)?;

    let viewer = DirectoryViewer::new(&settings.output_dir).launching_external_viewer(args.open);
    let controller = SubmissionController::from_settings(&settings, Arc::new(viewer))?;

    let mut events = controller.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event.state {
                SubmissionState::Submitting => println!("{}", event.state.action_label()),
                _ if !event.status_message.is_empty() => println!("{}", event.status_message),
                _ => {}
            }
        }
    });

    let result = controller.submit(&form).await;
    drop(controller);
    let _ = printer.await;

    match result {
        Ok(_) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            tracing::debug!("submission error: {err:?}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn build_form(args: &Args) -> Result<FormState> {
    let mut form = FormState::new();
    form.set_name(args.name.clone().unwrap_or_default());
    form.set_email(args.email.clone());

    let named = [
        (QuestionId::SleepQuality, &args.sleep),
        (QuestionId::PhysicalActivityHours, &args.activity_hours),
        (QuestionId::Diet, &args.diet),
        (QuestionId::StressLevel, &args.stress),
    ];
    for (id, raw) in named {
        if let Some(raw) = raw {
            let answer = id.spec().parse_answer(raw)?;
            form.set_answer(id, answer);
        }
    }

    for entry in &args.answers {
        let (key, raw) = entry
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{entry}'"))?;
        let key = key.trim();
        let Some(id) = QuestionId::from_key(key) else {
            tracing::warn!(key, "ignoring answer for unknown question");
            continue;
        };
        let answer = id.spec().parse_answer(raw)?;
        form.set_answer(id, answer);
    }

    if let Some(path) = &args.logo {
        form.select_logo_file(path);
    }

    Ok(form)
}

fn print_questions() {
    for question in &QUESTIONS {
        let kind = match question.kind {
            QuestionKind::Choice { options } => format!("one of: {}", options.join(", ")),
            QuestionKind::Range { min, max } => format!("whole number {min}..={max}"),
            QuestionKind::FreeText => "free text".to_string(),
        };
        println!("{:<24} {}  [{}]", question.id.key(), question.prompt, kind);
    }
}
