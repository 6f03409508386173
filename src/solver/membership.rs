//! Membership lists for the non-zero and non-bound multiplier sets
//!
//! Each exemplar owns exactly one node, so the node arena is indexed by
//! exemplar and no separate free pool is needed. Insert, remove and
//! membership tests are O(1); iteration follows insertion order.

const NIL: usize = usize::MAX;

/// Intrusive doubly linked index set over `0..n`
#[derive(Debug, Clone)]
pub struct MembershipList {
    prev: Vec<usize>,
    next: Vec<usize>,
    member: Vec<bool>,
    head: usize,
    tail: usize,
    len: usize,
}

impl MembershipList {
    /// Create an empty list over exemplars `0..n`
    pub fn new(n: usize) -> Self {
        Self {
            prev: vec![NIL; n],
            next: vec![NIL; n],
            member: vec![false; n],
            head: NIL,
            tail: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, i: usize) -> bool {
        self.member[i]
    }

    /// Append `i`; returns false if it was already a member
    pub fn insert(&mut self, i: usize) -> bool {
        if self.member[i] {
            return false;
        }
        self.member[i] = true;
        self.prev[i] = self.tail;
        self.next[i] = NIL;
        if self.tail == NIL {
            self.head = i;
        } else {
            self.next[self.tail] = i;
        }
        self.tail = i;
        self.len += 1;
        true
    }

    /// Unlink `i`; returns false if it was not a member
    pub fn remove(&mut self, i: usize) -> bool {
        if !self.member[i] {
            return false;
        }
        let (p, n) = (self.prev[i], self.next[i]);
        if p == NIL {
            self.head = n;
        } else {
            self.next[p] = n;
        }
        if n == NIL {
            self.tail = p;
        } else {
            self.prev[n] = p;
        }
        self.prev[i] = NIL;
        self.next[i] = NIL;
        self.member[i] = false;
        self.len -= 1;
        true
    }

    /// Insert or remove `i` so that membership equals `present`
    pub fn set(&mut self, i: usize, present: bool) {
        if present {
            self.insert(i);
        } else {
            self.remove(i);
        }
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    /// Snapshot of the members, safe to hold while the list is mutated
    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

pub struct Iter<'a> {
    list: &'a MembershipList,
    cursor: usize,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.cursor == NIL {
            return None;
        }
        let current = self.cursor;
        self.cursor = self.list.next[current];
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_iterate_in_order() {
        let mut list = MembershipList::new(6);
        assert!(list.insert(3));
        assert!(list.insert(0));
        assert!(list.insert(5));
        assert!(!list.insert(0));

        assert_eq!(list.len(), 3);
        assert_eq!(list.to_vec(), vec![3, 0, 5]);
        assert!(list.contains(5));
        assert!(!list.contains(1));
    }

    #[test]
    fn test_remove_head_middle_tail() {
        let mut list = MembershipList::new(5);
        for i in 0..5 {
            list.insert(i);
        }
        assert!(list.remove(2));
        assert_eq!(list.to_vec(), vec![0, 1, 3, 4]);
        assert!(list.remove(0));
        assert_eq!(list.to_vec(), vec![1, 3, 4]);
        assert!(list.remove(4));
        assert_eq!(list.to_vec(), vec![1, 3]);
        assert!(!list.remove(4));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_remove_last_member_empties_list() {
        let mut list = MembershipList::new(2);
        list.insert(1);
        list.remove(1);
        assert!(list.is_empty());
        assert_eq!(list.iter().count(), 0);

        // list is reusable afterwards
        list.insert(0);
        list.insert(1);
        assert_eq!(list.to_vec(), vec![0, 1]);
    }

    #[test]
    fn test_set_toggles_membership() {
        let mut list = MembershipList::new(3);
        list.set(2, true);
        list.set(2, true);
        assert_eq!(list.len(), 1);
        list.set(2, false);
        list.set(1, false);
        assert!(list.is_empty());
    }
}
