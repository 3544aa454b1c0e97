use rand::seq::SliceRandom;
use std::{collections::VecDeque, time::Duration};
use tracing::debug;

use super::track::Track;
use crate::error::{PlayerError, PlayerResult};

/// Ordered, bounded list of upcoming tracks.
///
/// The queue has no synchronization of its own: it is only ever touched while
/// the owning [`GuildPlayer`](super::player::GuildPlayer) holds its lock.
/// Positions are 1-based at this boundary.
#[derive(Debug)]
pub struct TrackQueue {
    items: VecDeque<Track>,
    max_len: usize,
}

impl TrackQueue {
    pub fn new(max_len: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_len,
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_len
    }

    /// Changes the bound for future enqueues. Items already queued are kept
    /// even if there are more of them than the new bound.
    pub fn set_capacity(&mut self, max_len: usize) {
        self.max_len = max_len;
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends a track and returns its 1-based position.
    pub fn enqueue(&mut self, track: Track) -> PlayerResult<usize> {
        if self.items.len() >= self.max_len {
            return Err(PlayerError::QueueFull { max: self.max_len });
        }

        self.items.push_back(track);
        Ok(self.items.len())
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    /// Puts a track that just left the front back at the end (loop-all
    /// rotation). Always paired with a `pop_front`, so the length does not grow.
    pub(crate) fn requeue(&mut self, track: Track) {
        self.items.push_back(track);
    }

    pub fn remove(&mut self, index: usize) -> PlayerResult<Track> {
        let slot = self.slot(index)?;
        let removed = self
            .items
            .remove(slot)
            .ok_or(PlayerError::InvalidIndex { index, len: self.items.len() })?;
        debug!("❌ Track removed at position {}", index);
        Ok(removed)
    }

    pub fn move_track(&mut self, from: usize, to: usize) -> PlayerResult<()> {
        let from_slot = self.slot(from)?;
        let to_slot = self.slot(to)?;

        if from_slot != to_slot {
            let item = self
                .items
                .remove(from_slot)
                .ok_or(PlayerError::InvalidIndex { index: from, len: self.items.len() })?;
            self.items.insert(to_slot, item);
            debug!("📍 Track moved from position {} to {}", from, to);
        }

        Ok(())
    }

    pub fn shuffle(&mut self) {
        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Drops up to `count` tracks from the front and returns how many went.
    pub fn discard_front(&mut self, count: usize) -> usize {
        let discarded = count.min(self.items.len());
        self.items.drain(..discarded);
        discarded
    }

    pub fn tracks(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    /// Sum of the known durations; tracks without one count as zero.
    pub fn total_duration(&self) -> Duration {
        self.items.iter().filter_map(Track::duration_as_std).sum()
    }

    /// One page of the queue for listings. Pages start at 1; page 0 is
    /// treated as the first page.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let total_items = self.items.len();
        let total_pages = if total_items == 0 {
            1
        } else {
            total_items.div_ceil(per_page)
        };
        let current_page = page.max(1);
        let start = (current_page - 1) * per_page;

        QueuePage {
            items: self
                .items
                .iter()
                .enumerate()
                .skip(start)
                .take(per_page)
                .map(|(i, track)| (i + 1, track.clone()))
                .collect(),
            current_page,
            total_pages,
            total_items,
        }
    }

    fn slot(&self, index: usize) -> PlayerResult<usize> {
        if index == 0 || index > self.items.len() {
            return Err(PlayerError::InvalidIndex {
                index,
                len: self.items.len(),
            });
        }
        Ok(index - 1)
    }
}

/// A page of queue entries, each paired with its 1-based position.
#[derive(Debug, Clone)]
pub struct QueuePage {
    pub items: Vec<(usize, Track)>,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serenity::model::id::UserId;

    fn track(title: &str) -> Track {
        Track::new(title, format!("https://example.com/{title}"), UserId::new(1))
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.iter().map(|t| t.title().to_string()).collect()
    }

    fn filled(names: &[&str]) -> TrackQueue {
        let mut queue = TrackQueue::new(100);
        for name in names {
            queue.enqueue(track(name)).unwrap();
        }
        queue
    }

    #[test]
    fn test_enqueue_returns_position_and_respects_capacity() {
        let mut queue = TrackQueue::new(2);
        assert_eq!(queue.enqueue(track("a")).unwrap(), 1);
        assert_eq!(queue.enqueue(track("b")).unwrap(), 2);

        let err = queue.enqueue(track("c")).unwrap_err();
        assert_eq!(err, PlayerError::QueueFull { max: 2 });
        assert_eq!(titles(&queue), vec!["a", "b"]);
    }

    #[test]
    fn test_lower_capacity_keeps_existing_items() {
        let mut queue = filled(&["a", "b", "c"]);
        queue.set_capacity(1);
        assert_eq!(queue.len(), 3);
        assert!(matches!(queue.enqueue(track("d")), Err(PlayerError::QueueFull { max: 1 })));
    }

    #[test]
    fn test_pop_front_is_fifo() {
        let mut queue = filled(&["a", "b"]);
        assert_eq!(queue.pop_front().unwrap().title(), "a");
        assert_eq!(queue.pop_front().unwrap().title(), "b");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_remove_is_one_based() {
        let mut queue = filled(&["a", "b", "c"]);
        assert_eq!(queue.remove(2).unwrap().title(), "b");
        assert_eq!(titles(&queue), vec!["a", "c"]);

        assert_eq!(queue.remove(0).unwrap_err(), PlayerError::InvalidIndex { index: 0, len: 2 });
        assert_eq!(queue.remove(3).unwrap_err(), PlayerError::InvalidIndex { index: 3, len: 2 });
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_move_track() {
        let mut queue = filled(&["a", "b", "c", "d"]);
        queue.move_track(1, 3).unwrap();
        assert_eq!(titles(&queue), vec!["b", "c", "a", "d"]);

        queue.move_track(4, 1).unwrap();
        assert_eq!(titles(&queue), vec!["d", "b", "c", "a"]);

        assert!(queue.move_track(1, 5).is_err());
        assert!(queue.move_track(0, 1).is_err());
        assert_eq!(titles(&queue), vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn test_shuffle_keeps_the_same_tracks() {
        let names: Vec<String> = (0..20).map(|i| format!("t{i}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let mut queue = filled(&refs);
        queue.shuffle();

        let mut after = titles(&queue);
        after.sort();
        let mut expected = names.clone();
        expected.sort();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_discard_front_clamps() {
        let mut queue = filled(&["a", "b"]);
        assert_eq!(queue.discard_front(5), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.discard_front(1), 0);
    }

    #[test]
    fn test_total_duration_and_paging() {
        let mut queue = TrackQueue::new(10);
        queue.enqueue(track("a").with_duration(60)).unwrap();
        queue.enqueue(track("b")).unwrap();
        queue.enqueue(track("c").with_duration(30)).unwrap();
        assert_eq!(queue.total_duration(), Duration::from_secs(90));

        let page = queue.page(2, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.total_items, 3);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].0, 3);
        assert_eq!(page.items[0].1.title(), "c");

        let empty = TrackQueue::new(10).page(0, 10);
        assert_eq!(empty.current_page, 1);
        assert_eq!(empty.total_pages, 1);
        assert!(empty.items.is_empty());
    }
}
