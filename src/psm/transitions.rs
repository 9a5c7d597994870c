//! The command/phase transition table (spec.md §4.1), re-architected per
//! spec.md §9 as a closed command enumeration plus a lookup table keyed by
//! `(command, current_phase)` — not the source's string-keyed dispatch.

use crate::model::{Command, Phase, TaskState};

/// Resource lock action a transition requires, beyond the generic phase
/// bump — only `commit-*` acquires the repository lock (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceAction {
    None,
    AcquireRepositoryLock,
}

/// One row of the transition table.
struct Rule {
    command: Command,
    from: Phase,
    to: Phase,
    precondition: fn(&TaskState) -> Result<(), &'static str>,
    resource_action: ResourceAction,
}

fn always_ok(_: &TaskState) -> Result<(), &'static str> {
    Ok(())
}

fn requires_failing_tests(s: &TaskState) -> Result<(), &'static str> {
    if s.has_failing_tests {
        Ok(())
    } else {
        Err("requires a failing test result before entering CODE_GREEN")
    }
}

fn requires_passing_tests(s: &TaskState) -> Result<(), &'static str> {
    if s.has_passing_tests {
        Ok(())
    } else {
        Err("requires a passing test result before this transition")
    }
}

fn requires_failing_and_test_files(s: &TaskState) -> Result<(), &'static str> {
    if s.has_failing_tests && s.has_test_files {
        Ok(())
    } else {
        Err("requires failing tests and committed test files")
    }
}

fn requires_passing_and_committed_tests(s: &TaskState) -> Result<(), &'static str> {
    if s.has_passing_tests && s.has_committed_tests {
        Ok(())
    } else {
        Err("requires passing tests and previously committed test files")
    }
}

/// Static transition table, one row per cell of spec.md §4.1's matrix that
/// is not `—`. `Start`/`Status`/`Abort` are handled structurally in
/// `lookup` since they apply from any phase.
fn table() -> &'static [Rule] {
    use Command::*;
    use Phase::*;
    &[
        Rule { command: Design, from: Design, to: Design, precondition: always_ok, resource_action: ResourceAction::None },
        Rule { command: Test, from: Design, to: TestRed, precondition: always_ok, resource_action: ResourceAction::None },
        Rule { command: Test, from: TestRed, to: TestRed, precondition: always_ok, resource_action: ResourceAction::None },
        Rule { command: Code, from: TestRed, to: CodeGreen, precondition: requires_failing_tests, resource_action: ResourceAction::None },
        Rule { command: Code, from: CodeGreen, to: CodeGreen, precondition: always_ok, resource_action: ResourceAction::None },
        Rule { command: Refactor, from: CodeGreen, to: Refactor, precondition: requires_passing_tests, resource_action: ResourceAction::None },
        Rule { command: Refactor, from: Refactor, to: Refactor, precondition: always_ok, resource_action: ResourceAction::None },
        Rule { command: Commit, from: CodeGreen, to: Commit, precondition: requires_passing_tests, resource_action: ResourceAction::AcquireRepositoryLock },
        Rule { command: Commit, from: Refactor, to: Commit, precondition: requires_passing_tests, resource_action: ResourceAction::AcquireRepositoryLock },
        Rule { command: CommitTests, from: TestRed, to: CodeGreen, precondition: requires_failing_and_test_files, resource_action: ResourceAction::AcquireRepositoryLock },
        Rule { command: CommitCode, from: CodeGreen, to: Refactor, precondition: requires_passing_and_committed_tests, resource_action: ResourceAction::AcquireRepositoryLock },
        Rule { command: CommitRefactor, from: Refactor, to: Commit, precondition: requires_passing_and_committed_tests, resource_action: ResourceAction::AcquireRepositoryLock },
        Rule { command: Next, from: Design, to: TestRed, precondition: always_ok, resource_action: ResourceAction::None },
        Rule { command: Next, from: TestRed, to: CodeGreen, precondition: requires_failing_tests, resource_action: ResourceAction::None },
        Rule { command: Next, from: CodeGreen, to: Refactor, precondition: requires_passing_tests, resource_action: ResourceAction::None },
        Rule { command: Next, from: Refactor, to: Commit, precondition: requires_passing_tests, resource_action: ResourceAction::AcquireRepositoryLock },
        Rule { command: Next, from: Commit, to: Design, precondition: always_ok, resource_action: ResourceAction::None },
    ]
}

/// Outcome of a successful lookup: the destination phase and any resource
/// action the transition requires.
pub struct Resolved {
    pub new_phase: Phase,
    pub resource_action: ResourceAction,
}

/// Error detail for a failed lookup, distinguishing "illegal from this
/// phase" from "legal but precondition unmet" per spec.md §4.1's
/// validation contract.
pub enum LookupError {
    Illegal { hint: String },
    PreconditionUnmet { hint: String },
}

/// Resolve `(command, current_phase)` against the transition table plus the
/// structural any-phase commands (`start`, `status`, `abort`).
pub fn lookup(command: Command, phase: Phase, task_state: &TaskState) -> Result<Resolved, LookupError> {
    match command {
        Command::Start => {
            return Ok(Resolved { new_phase: Phase::Design, resource_action: ResourceAction::None });
        }
        Command::Status => {
            return Ok(Resolved { new_phase: phase, resource_action: ResourceAction::None });
        }
        Command::Abort => {
            return Ok(Resolved { new_phase: Phase::Commit, resource_action: ResourceAction::None });
        }
        _ => {}
    }

    let candidates: Vec<&Rule> = table()
        .iter()
        .filter(|r| r.command == command && r.from == phase)
        .collect();

    if candidates.is_empty() {
        return Err(LookupError::Illegal {
            hint: format!("'{command}' is not a legal command from phase '{phase}'"),
        });
    }

    // Multiple rows only differ by precondition (e.g. `code` has a
    // TEST_RED->CODE_GREEN row and a CODE_GREEN->CODE_GREEN row); at most one
    // applies for a concrete `from`, so take the first.
    let rule = candidates[0];
    match (rule.precondition)(task_state) {
        Ok(()) => Ok(Resolved {
            new_phase: rule.to,
            resource_action: rule.resource_action,
        }),
        Err(hint) => Err(LookupError::PreconditionUnmet {
            hint: hint.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn design_to_test_red_via_next() {
        let r = lookup(Command::Next, Phase::Design, &TaskState::default()).ok().unwrap();
        assert_eq!(r.new_phase, Phase::TestRed);
    }

    #[test]
    fn code_requires_failing_tests() {
        let err = lookup(Command::Code, Phase::TestRed, &TaskState::default());
        assert!(matches!(err, Err(LookupError::PreconditionUnmet { .. })));
    }

    #[test]
    fn code_is_illegal_from_design() {
        let err = lookup(Command::Code, Phase::Design, &TaskState::default());
        assert!(matches!(err, Err(LookupError::Illegal { .. })));
    }

    #[test]
    fn commit_requires_repository_lock() {
        let ts = TaskState { has_passing_tests: true, ..Default::default() };
        let r = lookup(Command::Commit, Phase::CodeGreen, &ts).ok().unwrap();
        assert_eq!(r.resource_action, ResourceAction::AcquireRepositoryLock);
    }

    #[test]
    fn abort_is_legal_from_any_phase() {
        for phase in [Phase::Design, Phase::TestRed, Phase::CodeGreen, Phase::Refactor, Phase::Commit] {
            let r = lookup(Command::Abort, phase, &TaskState::default()).ok().unwrap();
            assert_eq!(r.new_phase, Phase::Commit);
        }
    }
}
