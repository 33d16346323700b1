//! Expert Event

#[derive(Debug, Clone)]
pub enum ExpertEvent {
	Ready { name: String },
	InstUploaded,
	QuestionSent { thread_id: String },
}
