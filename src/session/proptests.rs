//! Property-based tests for session transitions
//!
//! Random interleavings of agent and operator actions must keep the
//! session in a consistent state.

use super::state::*;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Action {
    Instruct(String),
    Take,
    Continue(Option<String>),
    TapOut,
    Complete,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => "[a-z]{1,10}".prop_map(Action::Instruct),
        3 => Just(Action::Take),
        2 => proptest::option::of("[a-z ]{0,20}").prop_map(Action::Continue),
        1 => Just(Action::TapOut),
        1 => Just(Action::Complete),
    ]
}

fn apply(session: &mut Session, action: Action) -> Option<Handoff> {
    match action {
        Action::Instruct(text) => {
            let _ = session.accept_instruction(text);
            None
        }
        Action::Take => session.take_handoff(),
        Action::Continue(context) => {
            session.update_context(context);
            None
        }
        Action::TapOut => {
            session.terminate();
            None
        }
        Action::Complete => {
            session.complete();
            None
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // A pending instruction only ever exists while the agent is waiting
    #[test]
    fn prop_pending_only_while_waiting(actions in proptest::collection::vec(arb_action(), 0..30)) {
        let mut session = Session::new("prop", None);
        for action in actions {
            apply(&mut session, action);
            if session.pending_instruction.is_some() {
                prop_assert_eq!(session.state, SessionState::Waiting);
            }
        }
    }

    // Once terminal, always terminal, and every wake-up says terminate
    #[test]
    fn prop_terminal_is_sticky(actions in proptest::collection::vec(arb_action(), 0..30)) {
        let mut session = Session::new("prop", None);
        let mut reached_terminal = false;

        for action in actions {
            let handoff = apply(&mut session, action);
            if reached_terminal {
                prop_assert!(session.state.is_terminal());
                if let Some(handoff) = handoff {
                    prop_assert_eq!(handoff, Handoff::Terminated);
                }
            }
            reached_terminal |= session.state.is_terminal();
        }
    }

    // Every accepted instruction is handed off at most once
    #[test]
    fn prop_instruction_delivered_at_most_once(actions in proptest::collection::vec(arb_action(), 0..30)) {
        let mut session = Session::new("prop", None);
        let mut accepted = 0usize;
        let mut delivered = 0usize;

        for action in actions {
            if let Action::Instruct(text) = action {
                if session.accept_instruction(text).is_ok() {
                    accepted += 1;
                }
                continue;
            }
            if let Some(Handoff::Instruction(_)) = apply(&mut session, action) {
                delivered += 1;
            }
        }

        prop_assert!(delivered <= accepted);
    }
}
