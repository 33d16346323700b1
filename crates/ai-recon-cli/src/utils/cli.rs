use crate::Result;
use console::{style, Style, StyledObject, Term};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use std::future::Future;
use tokio::task::spawn_blocking;

// region:    --- Prompts

pub fn prompt(text: &str) -> Result<String> {
	let theme = ColorfulTheme {
		prompt_style: Style::new().for_stderr().color256(45),
		prompt_prefix: style("?".to_string()).color256(45).for_stderr(),
		..ColorfulTheme::default()
	};

	Term::stdout().write_line("")?;
	let input = Input::with_theme(&theme);
	let res = input.with_prompt(text).interact_text()?;

	Ok(res)
}

/// Reads one line on a blocking task, raced against Ctrl-C.
///
/// Returns `None` on Ctrl-C, whether the signal or the interrupted read wins the race.
/// The blocking read itself cannot be aborted and is left behind.
pub async fn prompt_or_interrupt(text: &'static str) -> Result<Option<String>> {
	let read = spawn_blocking(move || prompt(text));

	let Some(res) = or_interrupt(read, tokio::signal::ctrl_c()).await else {
		return Ok(None);
	};

	match res? {
		Ok(input) => Ok(Some(input)),
		Err(err) if err.is_interrupted() => Ok(None),
		Err(err) => Err(err),
	}
}

/// Runs `fut` until it completes, or until `interrupt` does. `None` when interrupted,
/// in which case `fut` is dropped.
pub async fn or_interrupt<F, I>(fut: F, interrupt: I) -> Option<F::Output>
where
	F: Future,
	I: Future,
{
	tokio::select! {
		res = fut => Some(res),
		_ = interrupt => None,
	}
}

// endregion: --- Prompts

// region:    --- Icons

pub fn ico_res() -> StyledObject<&'static str> {
	style("➤").color256(45)
}

pub fn ico_check() -> StyledObject<&'static str> {
	style("✔").green()
}

pub fn ico_found() -> StyledObject<&'static str> {
	style("≡").green()
}

pub fn ico_uploading() -> StyledObject<&'static str> {
	style("↥").yellow()
}

pub fn ico_uploaded() -> StyledObject<&'static str> {
	style("↥").green()
}

pub fn ico_deleted_ok() -> StyledObject<&'static str> {
	style("⌫").green()
}

pub fn ico_tool() -> StyledObject<&'static str> {
	style("⚙").color256(45)
}

pub fn ico_err() -> StyledObject<&'static str> {
	style("✗").red()
}

// endregion: --- Icons

// region:    --- Text Output

pub fn txt_res(text: String) -> StyledObject<String> {
	style(text).bright()
}

pub fn txt_dim(text: String) -> StyledObject<String> {
	style(text).dim()
}

// endregion: --- Text Output

// region:    --- Tests


// endregion: --- Tests
