use rig::completion::Message;
use tracing::info;

use crate::error::{InterviewError, Result};
use crate::model::PatientModel;
use crate::session::{ConversationSession, SessionPhase};
use crate::turn_log::{Role, TurnLog};

/// Marker carried by internal "full instructions" turns. Exchanges containing
/// it are logged like any other but written as not visible, so the rendered
/// transcript never shows them.
pub const INSTRUCTION_MARKER: &str = "전체 지시 사항";

/// A completed prompt/reply pair.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub prompt: String,
    pub reply: String,
    pub visible: bool,
}

/// Run one exchange against the patient model: send the prompt with the
/// session's history, then log exactly one interviewer turn followed by
/// exactly one patient turn.
///
/// The seed exchange (case document text) and user-driven exchanges both go
/// through here; the only difference is where the prompt came from.
///
/// On model failure or an empty reply the error propagates and nothing is
/// logged or appended to the session history.
pub async fn run_exchange(
    model: &dyn PatientModel,
    log: &TurnLog,
    session: &mut ConversationSession,
    prompt: &str,
) -> Result<Exchange> {
    let reply = model.reply(&session.history, prompt).await?;

    // Guard the two-rows-per-exchange invariant here, not in the model
    // implementations: a no-text reply must never reach the log.
    if reply.trim().is_empty() {
        return Err(InterviewError::EmptyModelReply);
    }

    let visible =
        !prompt.contains(INSTRUCTION_MARKER) && !reply.contains(INSTRUCTION_MARKER);

    log.append(Role::Interviewer, prompt, visible).await?;
    log.append(Role::Patient, &reply, visible).await?;

    session.history.push(Message::user(prompt.to_string()));
    session.history.push(Message::assistant(reply.clone()));
    session.phase = SessionPhase::Conversing;

    info!(
        session_id = %session.id,
        visible,
        "exchange completed ({} turns in session history)",
        session.history.len()
    );

    Ok(Exchange {
        prompt: prompt.to_string(),
        reply,
        visible,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InterviewError;
    use async_trait::async_trait;

    struct ScriptedPatient {
        reply: String,
    }

    #[async_trait]
    impl PatientModel for ScriptedPatient {
        async fn reply(&self, _history: &[Message], _prompt: &str) -> Result<String> {
            Ok(self.reply.clone())
        }
    }

    struct FailingPatient;

    #[async_trait]
    impl PatientModel for FailingPatient {
        async fn reply(&self, _history: &[Message], _prompt: &str) -> Result<String> {
            Err(InterviewError::ModelCallFailed("connection reset".to_string()))
        }
    }

    struct SilentPatient;

    #[async_trait]
    impl PatientModel for SilentPatient {
        async fn reply(&self, _history: &[Message], _prompt: &str) -> Result<String> {
            Ok("   ".to_string())
        }
    }

    async fn memory_log() -> TurnLog {
        TurnLog::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_exchange_logs_interviewer_then_patient() {
        let model = ScriptedPatient {
            reply: "가슴이 아파서 왔습니다.".to_string(),
        };
        let log = memory_log().await;
        let mut session = ConversationSession::new("s1".to_string());

        let exchange = run_exchange(&model, &log, &mut session, "어디가 불편해서 오셨나요?")
            .await
            .unwrap();

        assert!(exchange.visible);
        assert_eq!(session.phase, SessionPhase::Conversing);
        assert_eq!(session.history.len(), 2);

        let turns = log.turns().await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::Interviewer);
        assert_eq!(turns[0].message, "어디가 불편해서 오셨나요?");
        assert_eq!(turns[1].role, Role::Patient);
        assert_eq!(turns[1].message, "가슴이 아파서 왔습니다.");
    }

    #[tokio::test]
    async fn test_n_exchanges_produce_2n_alternating_rows() {
        let model = ScriptedPatient {
            reply: "reply".to_string(),
        };
        let log = memory_log().await;
        let mut session = ConversationSession::new("s1".to_string());

        for i in 0..5 {
            run_exchange(&model, &log, &mut session, &format!("question {i}"))
                .await
                .unwrap();
        }

        let turns = log.turns().await.unwrap();
        assert_eq!(turns.len(), 10);
        for pair in turns.chunks(2) {
            assert_eq!(pair[0].role, Role::Interviewer);
            assert_eq!(pair[1].role, Role::Patient);
        }
        // insertion order
        for w in turns.windows(2) {
            assert!(w[0].id < w[1].id);
        }
    }

    #[tokio::test]
    async fn test_model_failure_logs_nothing() {
        let log = memory_log().await;
        let mut session = ConversationSession::new("s1".to_string());

        let result = run_exchange(&FailingPatient, &log, &mut session, "hello").await;

        assert!(matches!(result, Err(InterviewError::ModelCallFailed(_))));
        assert_eq!(log.count().await.unwrap(), 0);
        assert!(session.history.is_empty());
        assert_eq!(session.phase, SessionPhase::Idle);
    }

    #[tokio::test]
    async fn test_empty_reply_logs_nothing() {
        let log = memory_log().await;
        let mut session = ConversationSession::new("s1".to_string());

        let result = run_exchange(&SilentPatient, &log, &mut session, "hello").await;

        assert!(matches!(result, Err(InterviewError::EmptyModelReply)));
        assert_eq!(log.count().await.unwrap(), 0);
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_marker_exchange_is_logged_but_not_visible() {
        let model = ScriptedPatient {
            reply: "알겠습니다.".to_string(),
        };
        let log = memory_log().await;
        let mut session = ConversationSession::new("s1".to_string());

        let prompt = format!("{INSTRUCTION_MARKER}: 당신은 45세 흉통 환자입니다.");
        let exchange = run_exchange(&model, &log, &mut session, &prompt)
            .await
            .unwrap();

        assert!(!exchange.visible);

        // Both rows are in the log, both hidden.
        let turns = log.turns().await.unwrap();
        assert_eq!(turns.len(), 2);
        assert!(turns.iter().all(|t| !t.visible));

        // A later ordinary exchange is visible again.
        let exchange = run_exchange(&model, &log, &mut session, "이름이 어떻게 되세요?")
            .await
            .unwrap();
        assert!(exchange.visible);
        assert_eq!(log.count().await.unwrap(), 4);
    }
}
