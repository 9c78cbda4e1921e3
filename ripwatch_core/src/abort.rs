/*!
# Rip Watch: Kill Switch
*/

use std::sync::{
	Arc,
	atomic::{
		AtomicBool,
		Ordering::{
			Acquire,
			AcqRel,
		},
	},
};



#[derive(Debug, Clone, Default)]
/// # Kill Switch.
///
/// This is a short-circuit for long-running operations across multiple
/// threads. The watchdog holds one for the whole process (tripped by the
/// binary's CTRL-C intercept), and each disc session holds another for its
/// own cancellation.
///
/// Clones share the same underlying flag.
pub struct KillSwitch(Arc<AtomicBool>);

impl KillSwitch {
	#[must_use]
	/// # New.
	pub fn new() -> Self { Self::default() }

	/// # Kill.
	///
	/// Flip the switch. This returns `true` only for the call that actually
	/// flipped it; subsequent calls are no-ops and return `false`.
	pub fn kill(&self) -> bool { ! self.0.swap(true, AcqRel) }

	#[must_use]
	/// # Dead?
	pub fn killed(&self) -> bool { self.0.load(Acquire) }
}



#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn t_kill_once() {
		let a = KillSwitch::new();
		let b = a.clone();
		assert!(! a.killed(), "The switch should start alive.");

		assert!(b.kill(), "The first kill should report the flip.");
		assert!(! a.kill(), "The second kill should be a no-op.");
		assert!(a.killed() && b.killed(), "Clones should share state.");
	}
}
