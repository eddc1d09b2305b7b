/// Scope of one live decode or one replay pass.
///
/// Owns the `toolkey` counter so keys never leak across conversations. Create
/// a fresh session for every construction pass.
#[derive(Debug, Default)]
pub struct TranscriptSession {
    next_toolkey: u64,
}

impl TranscriptSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the key for a newly opened block.
    pub fn claim_toolkey(&mut self) -> u64 {
        let key = self.next_toolkey;
        self.next_toolkey += 1;
        key
    }

    /// Key the next opened block will receive.
    #[must_use]
    pub fn peek_toolkey(&self) -> u64 {
        self.next_toolkey
    }
}

#[cfg(test)]
mod tests {
    use super::TranscriptSession;

    #[test]
    fn toolkeys_are_monotonic_and_never_reused() {
        let mut session = TranscriptSession::new();
        assert_eq!(session.claim_toolkey(), 0);
        assert_eq!(session.claim_toolkey(), 1);
        assert_eq!(session.peek_toolkey(), 2);
        assert_eq!(TranscriptSession::new().claim_toolkey(), 0);
    }
}
