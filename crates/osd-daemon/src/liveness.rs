use std::collections::HashSet;

use osd_types::{PeerAddr, PeerId};

/// Decides whether this daemon answers a ping.
///
/// Peers use pings to check liveness, so a policy that stays silent makes
/// the daemon look unresponsive without actually stopping it.
pub trait LivenessPolicy: Send + Sync {
    /// `true` to reply to a ping from `from` received by daemon `whoami`.
    fn answers_ping(&self, whoami: PeerId, from: PeerAddr) -> bool;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Answer every ping.
#[derive(Clone, Copy, Debug, Default)]
pub struct AlwaysAnswer;

impl LivenessPolicy for AlwaysAnswer {
    fn answers_ping(&self, _whoami: PeerId, _from: PeerAddr) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "always-answer"
    }
}

/// Daemons in this set ignore pings; everyone else answers.
#[derive(Clone, Debug, Default)]
pub struct PlayDead {
    identities: HashSet<PeerId>,
}

impl PlayDead {
    pub fn new(identities: impl IntoIterator<Item = PeerId>) -> Self {
        Self {
            identities: identities.into_iter().collect(),
        }
    }

    pub fn contains(&self, whoami: PeerId) -> bool {
        self.identities.contains(&whoami)
    }
}

impl LivenessPolicy for PlayDead {
    fn answers_ping(&self, whoami: PeerId, _from: PeerAddr) -> bool {
        !self.contains(whoami)
    }

    fn name(&self) -> &'static str {
        "play-dead"
    }
}
