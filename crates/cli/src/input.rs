// SPDX-License-Identifier: MIT

//! Stdin-backed [`InputProvider`] used outside of tests.

use async_trait::async_trait;
use codemachine_runtime::{InputProvider, InputSource};
use tokio::io::{AsyncBufReadExt, BufReader};

pub struct StdinInput;

#[async_trait]
impl InputProvider for StdinInput {
    async fn next_input(&self, source: InputSource, queued_prompt: Option<&str>) -> String {
        if source != InputSource::User {
            return queued_prompt.unwrap_or_default().to_string();
        }
        let mut line = String::new();
        let mut reader = BufReader::new(tokio::io::stdin());
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => queued_prompt.unwrap_or_default().to_string(),
            Ok(_) => line.trim_end_matches('\n').to_string(),
        }
    }
}
