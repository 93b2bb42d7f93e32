use bitflags::bitflags;

bitflags! {
    /// Requirements and permissions for one field access request.
    ///
    /// `READABLE` / `WRITABLE` are requirements: when set, failing to
    /// establish the corresponding access path is an error rather than a
    /// quiet miss. The remaining bits grant the policy extra latitude.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AccessFlags: u32 {
        /// Non-public fields may have their visibility forced open.
        const EXPOSE_HIDDEN = 0x01;
        /// The caller needs to write the field.
        const WRITABLE = 0x02;
        /// The caller needs to read the field.
        const READABLE = 0x04;
        const RW = Self::READABLE.bits() | Self::WRITABLE.bits();
        /// Fields declared on ancestor classes are in scope, and accessor
        /// discovery walks the ancestor chain.
        const EXPOSE_INHERITED = 0x08;
        /// A conventional setter may stand in for the field.
        const ALLOW_WRITE_METHOD = 0x20;
        /// A conventional getter may stand in for the field.
        const ALLOW_READ_METHOD = 0x40;
        const ALLOW_RW_METHODS =
            Self::ALLOW_READ_METHOD.bits() | Self::ALLOW_WRITE_METHOD.bits();
        /// Prefer the setter even when the field is public.
        const FORCE_WRITE_METHOD = 0x200 | Self::ALLOW_WRITE_METHOD.bits();
        /// Prefer the getter even when the field is public.
        const FORCE_READ_METHOD = 0x400 | Self::ALLOW_READ_METHOD.bits();
        const FORCE_RW_METHODS =
            Self::FORCE_READ_METHOD.bits() | Self::FORCE_WRITE_METHOD.bits();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_implies_allow() {
        assert!(AccessFlags::FORCE_READ_METHOD.contains(AccessFlags::ALLOW_READ_METHOD));
        assert!(AccessFlags::FORCE_WRITE_METHOD.contains(AccessFlags::ALLOW_WRITE_METHOD));
        assert!(AccessFlags::FORCE_RW_METHODS.contains(AccessFlags::ALLOW_RW_METHODS));
    }

    #[test]
    fn rw_is_both_requirements() {
        assert_eq!(
            AccessFlags::RW,
            AccessFlags::READABLE | AccessFlags::WRITABLE
        );
    }
}
