use std::collections::HashSet;

/// User mutations layered over the immutable catalog.
///
/// An id is never in both `liked` and `disliked`. `deleted` only grows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationLedger {
    deleted: HashSet<i64>,
    liked: HashSet<i64>,
    disliked: HashSet<i64>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delete(&mut self, id: i64) {
        self.deleted.insert(id);
    }

    pub fn like(&mut self, id: i64) {
        self.liked.insert(id);
        self.undislike(id);
    }

    pub fn unlike(&mut self, id: i64) {
        self.liked.remove(&id);
    }

    pub fn dislike(&mut self, id: i64) {
        self.disliked.insert(id);
        self.unlike(id);
    }

    pub fn undislike(&mut self, id: i64) {
        self.disliked.remove(&id);
    }

    pub fn is_deleted(&self, id: i64) -> bool {
        self.deleted.contains(&id)
    }

    pub fn is_liked(&self, id: i64) -> bool {
        self.liked.contains(&id)
    }

    pub fn is_disliked(&self, id: i64) -> bool {
        self.disliked.contains(&id)
    }
}
