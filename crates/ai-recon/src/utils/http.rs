use crate::{Error, Result};
use reqwest::Response;
use serde::de::DeserializeOwned;

// region:    --- Response Readers

/// Turns a non-2xx response into `Error::Api` with the response body as cause.
pub async fn check_status(res: Response) -> Result<Response> {
	let status = res.status();
	if status.is_success() {
		Ok(res)
	} else {
		let body = res.text().await.unwrap_or_default();
		Err(Error::Api {
			status: status.as_u16(),
			body,
		})
	}
}

pub async fn read_json<T>(res: Response) -> Result<T>
where
	T: DeserializeOwned,
{
	let res = check_status(res).await?;
	let body = res.text().await?;
	let val = serde_json::from_str(&body)?;
	Ok(val)
}

// endregion: --- Response Readers
