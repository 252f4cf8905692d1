//! Single-stepping a trapped user context.

use crate::TrapContext;

/// Whether the monitor last asked for single-stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Running,
    Stepping,
}

/// What the monitor loop should do after a step or continue command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// The command did not apply; stay in the monitor.
    Ignored,
    /// Leave the monitor and return to the trapped context.
    Resume,
}

/// Single-step control over a trapped user context.
///
/// Only a context that stopped on a debug exception or a breakpoint raised in user mode
/// can be stepped or continued. Anything else is left untouched.
#[derive(Debug, Default)]
pub struct StepController {
    state: StepState,
}

impl StepController {
    pub const fn new() -> Self {
        Self {
            state: StepState::Running,
        }
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    /// Arms the trap flag so the context traps again after one instruction.
    pub fn step(&mut self, context: Option<&mut TrapContext>) -> Control {
        self.apply(context, StepState::Stepping)
    }

    /// Clears the trap flag so the context runs freely.
    pub fn resume(&mut self, context: Option<&mut TrapContext>) -> Control {
        self.apply(context, StepState::Running)
    }

    fn apply(&mut self, context: Option<&mut TrapContext>, target: StepState) -> Control {
        let Some(context) = context else {
            log::debug!("no trap context to resume");
            return Control::Ignored;
        };
        if !(context.is_debug_trap() && context.from_user()) {
            log::debug!(
                "not resuming {} from {:?}",
                context.trap_number,
                context.privilege_level()
            );
            return Control::Ignored;
        }

        context.set_trap_flag(target == StepState::Stepping);
        self.state = target;
        Control::Resume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrapNumber;

    const USER_CS: u16 = 0x1B;
    const KERNEL_CS: u16 = 0x08;

    fn context(trap_number: TrapNumber, cs: u16) -> TrapContext {
        TrapContext {
            trap_number,
            error_code: 0,
            eip: 0x0080_0020,
            cs,
            eflags: 0x0000_0202,
            ebp: 0xEEBF_DFD0,
            esp: 0xEEBF_DFC0,
        }
    }

    #[test]
    fn step_then_continue() {
        let mut controller = StepController::new();
        let mut ctx = context(TrapNumber::BREAKPOINT, USER_CS);

        assert_eq!(controller.step(Some(&mut ctx)), Control::Resume);
        assert_eq!(controller.state(), StepState::Stepping);
        assert!(ctx.trap_flag());

        ctx.trap_number = TrapNumber::DEBUG;
        assert_eq!(controller.step(Some(&mut ctx)), Control::Resume);
        assert!(ctx.trap_flag());

        assert_eq!(controller.resume(Some(&mut ctx)), Control::Resume);
        assert_eq!(controller.state(), StepState::Running);
        assert!(!ctx.trap_flag());
        assert_eq!(ctx.eflags, 0x0000_0202);
    }

    #[test]
    fn continue_while_running_clears_flag() {
        let mut controller = StepController::new();
        let mut ctx = context(TrapNumber::DEBUG, USER_CS);
        ctx.eflags |= 0x100;

        assert_eq!(controller.resume(Some(&mut ctx)), Control::Resume);
        assert!(!ctx.trap_flag());
    }

    #[test]
    fn ignores_missing_context() {
        let mut controller = StepController::new();
        assert_eq!(controller.step(None), Control::Ignored);
        assert_eq!(controller.resume(None), Control::Ignored);
        assert_eq!(controller.state(), StepState::Running);
    }

    #[test]
    fn ignores_other_traps() {
        let mut controller = StepController::new();
        let mut ctx = context(TrapNumber::PAGE_FAULT, USER_CS);
        let before = ctx.clone();

        assert_eq!(controller.step(Some(&mut ctx)), Control::Ignored);
        assert_eq!(ctx, before);
        assert_eq!(controller.state(), StepState::Running);
    }

    #[test]
    fn ignores_kernel_traps() {
        let mut controller = StepController::new();
        let mut ctx = context(TrapNumber::BREAKPOINT, KERNEL_CS);
        let before = ctx.clone();

        assert_eq!(controller.step(Some(&mut ctx)), Control::Ignored);
        assert_eq!(controller.resume(Some(&mut ctx)), Control::Ignored);
        assert_eq!(ctx, before);
    }

    #[test]
    fn ignored_command_keeps_state() {
        let mut controller = StepController::new();
        let mut user = context(TrapNumber::BREAKPOINT, USER_CS);
        controller.step(Some(&mut user));

        let mut kernel = context(TrapNumber::BREAKPOINT, KERNEL_CS);
        assert_eq!(controller.resume(Some(&mut kernel)), Control::Ignored);
        assert_eq!(controller.state(), StepState::Stepping);
    }
}
