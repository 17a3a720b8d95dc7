pub mod error;
pub mod exchange;
pub mod model;
pub mod session;
pub mod turn_log;

// Re-export commonly used types
pub use error::{InterviewError, Result};
pub use exchange::{Exchange, INSTRUCTION_MARKER, run_exchange};
pub use model::{GeminiPatient, PatientModel};
pub use session::{ConversationSession, InMemorySessionStore, SessionPhase, SessionStore};
pub use turn_log::{Role, Turn, TurnLog};

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use rig::completion::Message;

    struct EchoPatient;

    #[async_trait]
    impl PatientModel for EchoPatient {
        async fn reply(&self, history: &[Message], prompt: &str) -> Result<String> {
            Ok(format!("({}) you asked: {prompt}", history.len()))
        }
    }

    #[tokio::test]
    async fn test_seed_then_prompts_yields_two_n_plus_two_rows() {
        let store = InMemorySessionStore::new();
        let log = TurnLog::connect("sqlite::memory:").await.unwrap();
        let model = EchoPatient;

        let mut session = ConversationSession::new("interview-1".to_string());
        store.save(session.clone()).await.unwrap();

        // Seed exchange from a case document.
        session.phase = SessionPhase::AwaitingSeed;
        session.case_file = Some("case1.docx".to_string());
        run_exchange(&model, &log, &mut session, "Patient is a 45-year-old with chest pain.")
            .await
            .unwrap();

        // Three user-driven exchanges.
        for prompt in ["어디가 불편해서 오셨나요?", "언제부터 그러셨나요?", "궁금한 점이 있으신가요?"] {
            run_exchange(&model, &log, &mut session, prompt).await.unwrap();
        }
        store.save(session.clone()).await.unwrap();

        assert_eq!(log.count().await.unwrap(), 8);
        assert_eq!(session.phase, SessionPhase::Conversing);

        let latest_q = log.latest(Role::Interviewer).await.unwrap().unwrap();
        let latest_a = log.latest(Role::Patient).await.unwrap().unwrap();
        assert_eq!(latest_q.message, "궁금한 점이 있으신가요?");
        assert!(latest_a.message.contains("궁금한 점이 있으신가요?"));

        let reloaded = store.get("interview-1").await.unwrap().unwrap();
        assert_eq!(reloaded.history.len(), 8);
    }
}
