//! Registers and tag commands (spec §3 "Register" / "Tag command", §4.7).
//!
//! A register is just a dense [`RegisterId`] during determinization; the
//! spec's distinction between "real" (group-marker) and "temporary"
//! registers is purely about *who allocated it and when it gets copied into
//! a canonical slot*, not a different representation, so it is not modelled
//! as a separate enum here — [`crate::tdfa::Determinizer`] keeps that
//! bookkeeping separately (see its `canonical_register` map).

use crate::ids::RegisterId;

/// One step of a transition's or final state's effect on the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TagCommand {
    /// Assign the current input offset to `0`.
    SetPos(RegisterId),
    /// Copy the value of `src` into `dst`.
    Copy { dst: RegisterId, src: RegisterId },
}

impl TagCommand {
    pub fn dst(&self) -> RegisterId {
        match *self {
            TagCommand::SetPos(r) => r,
            TagCommand::Copy { dst, .. } => dst,
        }
    }

    /// The register read by this command, if any.
    pub fn src(&self) -> Option<RegisterId> {
        match *self {
            TagCommand::SetPos(_) => None,
            TagCommand::Copy { src, .. } => Some(src),
        }
    }
}

/// Enforce the invariant of spec §3 / §8 property 2: within a single
/// command list, a register that is the source of a `Copy` must not also be
/// the target of a `SetPos` in that same list. Any `Copy` whose source is
/// about to be (or already was) `SetPos`-assigned in this list is rewritten
/// to a plain `SetPos` of its own destination, since copying a
/// just-assigned-to-current-position register is equivalent to assigning
/// current position directly.
pub fn normalize(commands: Vec<TagCommand>) -> Vec<TagCommand> {
    let set_pos_targets: std::collections::HashSet<RegisterId> = commands
        .iter()
        .filter_map(|c| match c {
            TagCommand::SetPos(r) => Some(*r),
            TagCommand::Copy { .. } => None,
        })
        .collect();

    commands
        .into_iter()
        .map(|c| match c {
            TagCommand::Copy { dst, src } if set_pos_targets.contains(&src) => {
                TagCommand::SetPos(dst)
            }
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::RegisterId;

    #[test]
    fn normalize_rewrites_copy_of_set_pos_register() {
        let r0 = RegisterId::new(0);
        let r1 = RegisterId::new(1);
        let cmds = vec![TagCommand::SetPos(r0), TagCommand::Copy { dst: r1, src: r0 }];
        let out = normalize(cmds);
        assert_eq!(out, vec![TagCommand::SetPos(r0), TagCommand::SetPos(r1)]);
    }

    #[test]
    fn normalize_leaves_independent_copy_alone() {
        let r0 = RegisterId::new(0);
        let r1 = RegisterId::new(1);
        let r2 = RegisterId::new(2);
        let cmds = vec![TagCommand::SetPos(r0), TagCommand::Copy { dst: r1, src: r2 }];
        let out = normalize(cmds.clone());
        assert_eq!(out, cmds);
    }
}
