#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    messages_received: u64,
    total_tokens: i64,
    prompt_tokens: i64,
    response_tokens: i64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_message(&mut self) {
        self.messages_received += 1;
    }

    pub(crate) fn update_usage(&mut self, total: i64, prompt: i64, response: i64) {
        self.total_tokens += total;
        self.prompt_tokens += prompt;
        self.response_tokens += response;
    }

    pub fn messages_received(&self) -> u64 {
        self.messages_received
    }

    pub fn total_tokens(&self) -> i64 {
        self.total_tokens
    }

    pub fn prompt_tokens(&self) -> i64 {
        self.prompt_tokens
    }

    pub fn response_tokens(&self) -> i64 {
        self.response_tokens
    }
}
