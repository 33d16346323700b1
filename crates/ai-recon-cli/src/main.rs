// region:    --- Modules

mod error;
mod utils;

pub use self::error::{Error, Result};
use crate::utils::cli::{
	ico_check, ico_deleted_ok, ico_err, ico_found, ico_tool, ico_uploaded, ico_uploading,
	txt_dim,
};
use crate::utils::spinner::Spinner;
use ai_recon::agent::{AgentEvent, AgentOutcome};
use ai_recon::event::{AisEvent, Event, EventBus};
use ai_recon::{Expert, ExpertEvent};
use console::Term;
use std::io::{self, Write};
use std::time::Duration;
use textwrap::wrap;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::sleep;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use utils::cli::{ico_res, or_interrupt, prompt_or_interrupt, txt_res};

// endregion: --- Modules

#[tokio::main]
async fn main() {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
		)
		.with_writer(io::stderr)
		.without_time()
		.init();

	println!();
	let _ = io::stdout().flush();

	let code = match start().await {
		Ok(_) => {
			println!("\nBye!\n");
			0
		}
		Err(e) => {
			println!("\nError: {}\n", e);
			e.exit_code()
		}
	};

	// A prompt left behind by Ctrl-C would keep the runtime alive.
	std::process::exit(code);
}

const DEFAULT_DIR: &str = "recon";

// region:    --- Types

/// Input Command from the user
#[derive(Debug)]
enum Cmd {
	Quit,
	Ask(String),
	Agent(String),
	FineTune(String),
	Doc(String),
	Search(String),
	AskDocs(String),
	RefreshAll,
	RefreshInst,
}

impl Cmd {
	fn from_input(input: impl Into<String>) -> Self {
		let input = input.into();
		let (head, rest) = match input.split_once(' ') {
			Some((head, rest)) => (head, rest.trim().to_string()),
			None => (input.as_str(), String::new()),
		};

		match head {
			"/q" => Self::Quit,
			"/ask" => Self::Ask(rest),
			"/ft" => Self::FineTune(rest),
			"/doc" => Self::Doc(rest),
			"/search" => Self::Search(rest),
			"/docs" => Self::AskDocs(rest),
			"/r" | "/ra" => Self::RefreshAll,
			"/ri" => Self::RefreshInst,
			_ => Self::Agent(input),
		}
	}
}

// endregion: --- Types

async fn start() -> Result<()> {
	let event_bus = EventBus::new();

	let _ = event_printer(&event_bus).await;

	let mut expert = Expert::init_from_dir(DEFAULT_DIR, false, Some(event_bus)).await?;

	loop {
		// Lets the event printer flush before the prompt is drawn.
		sleep(Duration::from_millis(50)).await;

		let Some(input) = prompt_or_interrupt("Ask away").await? else {
			break;
		};

		let cmd = Cmd::from_input(input);
		debug!(?cmd, "command");

		if let Cmd::Quit = cmd {
			break;
		}

		if let Cmd::RefreshAll = cmd {
			let event_bus = EventBus::new();
			let _ = event_printer(&event_bus).await;

			expert = Expert::init_from_dir(DEFAULT_DIR, true, Some(event_bus)).await?;
			continue;
		}

		// Command errors are reported and the loop goes on. Ctrl-C drops the running command.
		match or_interrupt(run_cmd(&expert, cmd), tokio::signal::ctrl_c()).await {
			Some(Ok(())) => (),
			Some(Err(err)) => println!("{} {}", ico_err(), err),
			None => println!("\n{} Interrupted", ico_err()),
		}
	}

	Ok(())
}

async fn run_cmd(expert: &Expert, cmd: Cmd) -> Result<()> {
	match cmd {
		Cmd::Quit | Cmd::RefreshAll => (),

		Cmd::Ask(query) => {
			let spinner = Spinner::start(format!("Asking {}", expert.name()));
			let res = expert.ask(&query).await;
			spinner.stop().await;
			print_res(&res?);
		}

		Cmd::Agent(query) => {
			let agent = expert.agent()?;
			match agent.run(&query).await? {
				AgentOutcome::Answer(answer) => print_res(&answer),
				AgentOutcome::Exhausted { iterations } => println!(
					"{} No answer after {iterations} iterations",
					ico_err()
				),
			}
		}

		Cmd::FineTune(question) => {
			let spinner = Spinner::start("Fine-tuning");
			let res = expert.fine_tune().await;
			spinner.stop().await;
			let job = res?;
			println!("{} Using model {}", ico_check(), job.model_name());

			if !question.is_empty() {
				let answer = expert.ask_model(job.model_name(), &question).await?;
				print_res(&answer);
			}
		}

		Cmd::Doc(content) => {
			let res = expert.ensure_document(&content).await?;
			println!("{} Document {res}", ico_check());
		}

		Cmd::Search(query) => {
			let matches = expert.search_documents(&query).await?;
			if matches.is_empty() {
				println!("{} No matching document", ico_err());
			}
			for doc in matches {
				print_res(&doc.content);
				println!("{}", txt_dim(format!("   similarity {:.3}", doc.similarity)));
			}
		}

		Cmd::AskDocs(question) => {
			let spinner = Spinner::start("Searching documents");
			let res = expert.answer_from_documents(&question).await;
			spinner.stop().await;
			print_res(&res?);
		}

		Cmd::RefreshInst => {
			if !expert.refresh_instructions().await? {
				println!("{} No instructions file", ico_err());
			}
		}
	}

	Ok(())
}

fn print_res(res: &str) {
	let res = wrap(res, 80).join("\n");
	println!("{} {}", ico_res(), txt_res(res));
}

async fn event_printer(event_bus: &EventBus) -> Result<()> {
	let mut rx = event_bus.subscribe()?;

	tokio::spawn(async move {
		let term = Term::stdout();

		loop {
			let evt = match rx.recv().await {
				Ok(evt) => evt,
				Err(RecvError::Lagged(skipped)) => {
					let _ = term.write_line(&txt_dim(format!("   ({skipped} events skipped)")).to_string());
					continue;
				}
				// The event_bus has been replaced, nothing left to print.
				Err(RecvError::Closed) => break,
			};

			if let Some(line) = event_line(evt) {
				let _ = term.write_line(&line);
			}
			let _ = term.flush();
		}
	});

	Ok(())
}

fn event_line(evt: Event) -> Option<String> {
	match evt {
		Event::Ais(ais_evt) => match ais_evt {
			AisEvent::ResourceFound(res_ref) => Some(format!(
				"{} {} {} found ({})",
				ico_found(),
				res_ref.kind,
				res_ref.name,
				res_ref.id
			)),
			AisEvent::ResourceCreating { kind, name } => {
				Some(format!("{} Creating {kind} {name}", ico_uploading()))
			}
			AisEvent::ResourceCreated(res_ref) => Some(format!(
				"{} {} {} created ({})",
				ico_uploaded(),
				res_ref.kind,
				res_ref.name,
				res_ref.id
			)),
			AisEvent::ResourceDeleted(res_ref) => Some(format!(
				"{} {} {} deleted",
				ico_deleted_ok(),
				res_ref.kind,
				res_ref.id
			)),
			AisEvent::ResourceCantDelete { res_ref, cause } => Some(format!(
				"{} {} {} can't be deleted\n   cause: {cause}",
				ico_err(),
				res_ref.kind,
				res_ref.id
			)),
			AisEvent::RunStatus { status, .. } => {
				Some(txt_dim(format!("   run {status}")).to_string())
			}
			AisEvent::FineTuneJobStatus { job_id, status } => {
				Some(txt_dim(format!("   job {job_id} {status}")).to_string())
			}
		},

		Event::Agent(agent_evt) => match agent_evt {
			AgentEvent::IterationStarted(n) => {
				Some(txt_dim(format!("   iteration #{n}")).to_string())
			}
			AgentEvent::ToolCalled { name, arguments } => {
				Some(format!("{} {name} {arguments}", ico_tool()))
			}
			AgentEvent::Answered => None,
			AgentEvent::Exhausted { .. } => None,
		},

		Event::Expert(expert_evt) => match expert_evt {
			ExpertEvent::Ready { name } => Some(format!("{} Expert {name} ready", ico_check())),
			ExpertEvent::InstUploaded => Some(format!("{} Instructions uploaded", ico_check())),
			ExpertEvent::QuestionSent { .. } => None,
		},
	}
}

// region:    --- Tests


// endregion: --- Tests
