//! The executor state machine

use super::{Confirmation, ExecutionMode, ExecutionSession, Journal};
use crate::host::Host;
use crate::plan::{Mutation, Outcome, Planner};
use crate::rollback::RollbackRecorder;
use crate::rules::RuleSet;
use std::time::Instant;

/// Walks a plan against a host, one mutation at a time
///
/// Failures of individual mutations are recorded on the session and never
/// abort the batch.
pub struct Executor<'a> {
    host: &'a mut dyn Host,
    journal: &'a mut Journal,
    confirmation: Option<&'a mut dyn Confirmation>,
    recorder: Option<&'a mut RollbackRecorder>,
    planner: Planner,
}

impl<'a> Executor<'a> {
    pub fn new(host: &'a mut dyn Host, journal: &'a mut Journal) -> Self {
        Self {
            host,
            journal,
            confirmation: None,
            recorder: None,
            planner: Planner::new(),
        }
    }

    /// Ask before every committed mutation
    pub fn with_confirmation(mut self, confirmation: &'a mut dyn Confirmation) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    /// Persist the rollback artifact after every recorded entry
    pub fn with_recorder(mut self, recorder: &'a mut RollbackRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_planner(mut self, planner: Planner) -> Self {
        self.planner = planner;
        self
    }

    /// Plan and execute every entry of a rule set, in order
    ///
    /// Each entry is planned right before it runs, so its before-state is
    /// read after every earlier mutation has completed.
    pub fn run(&mut self, ruleset: &RuleSet, session: &mut ExecutionSession) {
        for warning in &ruleset.warnings {
            self.journal.warn(warning.clone());
        }
        self.journal.info(format!(
            "Processing {} rule(s) at level {}",
            ruleset.len(),
            ruleset.level
        ));

        for desired in ruleset {
            if self.planner.is_protected(&desired.target) {
                self.journal.warn(format!(
                    "{}: protected, left untouched",
                    desired.target
                ));
                session.protected += 1;
                continue;
            }
            let mutation = self.planner.plan_one(&*self.host, desired);
            self.execute(mutation, session);
        }
    }

    /// Execute already planned mutations, in order
    pub fn run_mutations(&mut self, mutations: Vec<Mutation>, session: &mut ExecutionSession) {
        for mutation in mutations {
            if self.planner.is_protected(mutation.target()) {
                self.journal.warn(format!(
                    "{}: protected, left untouched",
                    mutation.target()
                ));
                session.protected += 1;
                continue;
            }
            self.execute(mutation, session);
        }
    }

    /// Drive one mutation to a terminal state and record it
    fn execute(&mut self, mut mutation: Mutation, session: &mut ExecutionSession) {
        let started = Instant::now();

        if mutation.outcome == Outcome::Pending {
            match session.mode {
                ExecutionMode::DryRun => mutation.outcome = Outcome::Previewed,
                ExecutionMode::Commit => self.commit(&mut mutation, session),
            }
        }

        mutation.elapsed_ms = started.elapsed().as_millis() as u64;
        self.log_terminal(&mutation);
        session.record(mutation);
    }

    fn commit(&mut self, mutation: &mut Mutation, session: &mut ExecutionSession) {
        let Some(before) = mutation.before.clone() else {
            mutation.outcome = Outcome::SkippedNotFound;
            return;
        };

        if !mutation.is_noop()
            && let Some(confirmation) = self.confirmation.as_deref_mut()
            && !confirmation.confirm(mutation)
        {
            mutation.outcome = Outcome::SkippedUserDeclined;
            return;
        }

        let target = mutation.target().clone();
        let desired = mutation.desired.value.clone();
        let adapter = target.kind.adapter();

        // The inverse comes from the captured state alone, so it is built
        // before the host is touched.
        let inverse = match adapter.synthesize_inverse(&target, &before, &desired) {
            Ok(op) => op,
            Err(e) => {
                mutation.fail(format!("cannot build inverse: {}", e));
                return;
            }
        };

        if !mutation.is_noop()
            && let Err(e) = adapter.apply(&mut *self.host, &target, &desired)
        {
            mutation.fail(e.to_string());
            return;
        }

        let description = format!("Restore {} to {}", target, before);
        session.rollback.append(target, description, inverse);
        if let Some(recorder) = self.recorder.as_deref_mut()
            && let Err(e) = recorder.persist(&session.id, &session.rollback)
        {
            self.journal
                .warn(format!("Could not write rollback artifact: {}", e));
        }
        mutation.outcome = Outcome::Applied;
    }

    fn log_terminal(&mut self, mutation: &Mutation) {
        let target = mutation.target();
        let before = mutation.before_display();
        let after = mutation.after_display();
        match mutation.outcome {
            Outcome::Applied if mutation.is_noop() => self.journal.success(format!(
                "{}: already {} [{}] ({} ms)",
                target, after, mutation.outcome, mutation.elapsed_ms
            )),
            Outcome::Applied => self.journal.success(format!(
                "{}: {} -> {} [{}] ({} ms)",
                target, before, after, mutation.outcome, mutation.elapsed_ms
            )),
            Outcome::Previewed => self.journal.dry_run(format!(
                "{}: {} -> {} [would apply: {}]",
                target, before, mutation.desired.value, mutation.desired.justification
            )),
            Outcome::Failed => self.journal.error(format!(
                "{}: {} -> {} [{}] {}",
                target,
                before,
                mutation.desired.value,
                mutation.outcome,
                mutation.error.as_deref().unwrap_or("unknown error")
            )),
            Outcome::SkippedNotFound => self.journal.info(format!(
                "{}: not present on this host [{}]",
                target, mutation.outcome
            )),
            Outcome::SkippedUserDeclined => self.journal.info(format!(
                "{}: {} left as is [{}]",
                target, before, mutation.outcome
            )),
            Outcome::Pending => self.journal.warn(format!(
                "{}: never left pending state",
                target
            )),
        }
    }
}
