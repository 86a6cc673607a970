//! The agent runtime: everything that happens to one inbound message.
//!
//! 1. **Gate** the input through the security coordinator
//! 2. **Resume** the conversation from the session manager
//! 3. **Refuse** early if the agent's circuit breaker is open
//! 4. **Scope** tools from matched playbooks and the embedding selector
//! 5. **Loop** model ⇄ tools until a text reply
//! 6. **Repair** leaked tool calls and re-prompt once on hallucinated actions
//! 7. **Gate** the output, record the turn and feed the breaker

pub mod circuit;
pub mod guard;
pub mod recovery;
pub mod runtime;
pub mod sessions;

pub use circuit::{
    CircuitBreaker, CircuitBreakerOptions, CircuitBreakerRegistry, CircuitSnapshot, CircuitState,
};
pub use guard::HallucinationGuard;
pub use recovery::{LeakedToolCall, detect_leaked_tool_call, recover_leaked_tool_call};
pub use runtime::{AgentReply, AgentSettings, IncomingMessage, Orchestrator, ReplyFlag};
pub use sessions::{Session, SessionManager, SessionOptions, SessionStats, SessionTurn};
