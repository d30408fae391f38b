//! Editing session: the single owner of a [`Book`] while it is being edited.
//!
//! Every mutation schedules two coalescing background tasks, a state save and
//! a preview re-pagination. Each works on a snapshot taken at scheduling time,
//! so the book itself only ever has one mutator.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::book::{Book, SectionId, View};
use crate::markup::Page;
use crate::measure::{Measure, Measured};
use crate::paginate::Paginator;
use crate::section::Section;
use crate::store::StateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub save_delay: Duration,
    pub preview_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            save_delay: Duration::from_millis(1000),
            preview_delay: Duration::from_millis(300),
        }
    }
}

/// Single-slot timer: scheduling again cancels a run that is still waiting
/// out its delay. A run whose delay has elapsed is never interrupted, and each
/// run starts only after the one it replaced has finished, so runs complete in
/// scheduling order.
///
/// Dropping the debouncer detaches the pending run; it still fires.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    pending: Option<Pending>,
}

#[derive(Debug)]
struct Pending {
    cancel: Arc<Notify>,
    task: JoinHandle<()>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn schedule<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let previous = self.cancel();
        let delay = self.delay;
        let cancel = Arc::new(Notify::new());
        let cancelled = Arc::clone(&cancel);
        let task = tokio::spawn(async move {
            let fire = tokio::select! {
                biased;
                () = cancelled.notified() => false,
                () = tokio::time::sleep(delay) => true,
            };
            if let Some(previous) = previous
                && let Err(err) = previous.await
            {
                tracing::warn!(?err, "previous debounced run did not complete");
            }
            if fire {
                fut.await;
            }
        });
        self.pending = Some(Pending { cancel, task });
    }

    /// Cancels the pending run if it is still waiting. The returned handle
    /// resolves once that run and every run before it have finished.
    pub fn cancel(&mut self) -> Option<JoinHandle<()>> {
        let pending = self.pending.take()?;
        pending.cancel.notify_one();
        Some(pending.task)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| !pending.task.is_finished())
    }
}

pub type SharedMeasure = Arc<dyn Measure + Send + Sync>;

pub struct EditorSession {
    book: Book,
    store: Arc<dyn StateStore>,
    paginator: Arc<Paginator>,
    measure: SharedMeasure,
    save: Debouncer,
    preview: Debouncer,
    pages: watch::Sender<Arc<[Page]>>,
}

impl EditorSession {
    /// Restores the book from `store`. A state that fails to load is logged
    /// and replaced by an empty book.
    pub async fn open(
        store: Arc<dyn StateStore>,
        measure: SharedMeasure,
        config: SessionConfig,
    ) -> Self {
        let book = match store.load().await {
            Ok(Some(state)) => Book::from_state(&state),
            Ok(None) => Book::new(),
            Err(err) => {
                tracing::error!(?err, "failed to load state; starting with an empty book");
                Book::new()
            }
        };
        let (pages, _) = watch::channel(Arc::from(Vec::<Page>::new()));
        let mut session = Self {
            book,
            store,
            paginator: Arc::new(Paginator::new()),
            measure,
            save: Debouncer::new(config.save_delay),
            preview: Debouncer::new(config.preview_delay),
            pages,
        };
        session.schedule_preview();
        session
    }

    pub fn book(&self) -> &Book {
        &self.book
    }

    /// Receiver for the most recent preview pagination.
    pub fn pages(&self) -> watch::Receiver<Arc<[Page]>> {
        self.pages.subscribe()
    }

    pub fn append(&mut self, section: Section) -> SectionId {
        let id = self.book.append(section);
        self.touched();
        id
    }

    pub fn remove(&mut self, id: SectionId) -> anyhow::Result<Section> {
        let section = self.book.remove(id)?;
        self.touched();
        Ok(section)
    }

    pub fn move_up(&mut self, id: SectionId) -> anyhow::Result<()> {
        self.book.move_up(id)?;
        self.touched();
        Ok(())
    }

    pub fn move_down(&mut self, id: SectionId) -> anyhow::Result<()> {
        self.book.move_down(id)?;
        self.touched();
        Ok(())
    }

    pub fn begin_edit(&mut self, id: SectionId) -> anyhow::Result<&Section> {
        self.book.begin_edit(id)
    }

    pub fn update_editing(&mut self, section: Section) -> anyhow::Result<()> {
        self.book.update_editing(section)?;
        self.touched();
        Ok(())
    }

    pub fn commit(&mut self, section: Section) -> SectionId {
        let id = self.book.commit(section);
        self.touched();
        id
    }

    pub fn set_active_view(&mut self, view: View) {
        self.book.set_active_view(view);
        self.schedule_save();
    }

    pub fn clear(&mut self) {
        self.book.clear();
        self.touched();
    }

    /// Saves immediately, dropping any pending debounced save. A debounced
    /// save that is already writing finishes first.
    pub async fn save_now(&mut self) -> anyhow::Result<()> {
        if let Some(previous) = self.save.cancel()
            && let Err(err) = previous.await
        {
            tracing::warn!(?err, "debounced save did not complete");
        }
        self.store
            .save(&self.book.to_state())
            .await
            .context("save book state")
    }

    /// Ends the session, writing the book out before returning.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.preview.cancel();
        self.save_now().await
    }

    /// Paginates the current book synchronously.
    pub fn paginate_now(&self) -> Vec<Page> {
        self.paginator
            .paginate(self.book.sections(), &mut Measured(&*self.measure))
    }

    pub fn has_pending_save(&self) -> bool {
        self.save.is_pending()
    }

    fn touched(&mut self) {
        self.schedule_save();
        self.schedule_preview();
    }

    fn schedule_save(&mut self) {
        let store = Arc::clone(&self.store);
        let state = self.book.to_state();
        self.save.schedule(async move {
            if let Err(err) = store.save(&state).await {
                tracing::error!(?err, "debounced save failed");
            }
        });
    }

    fn schedule_preview(&mut self) {
        let paginator = Arc::clone(&self.paginator);
        let measure = Arc::clone(&self.measure);
        let sections: Vec<Section> = self.book.sections().cloned().collect();
        let pages = self.pages.clone();
        self.preview.schedule(async move {
            let laid_out = paginator.paginate(&sections, &mut Measured(&*measure));
            pages.send_replace(laid_out.into());
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::measure::UnitMeasure;
    use crate::section::Chapter;
    use crate::store::PersistedState;

    #[derive(Default)]
    struct RecordingStore {
        initial: Option<PersistedState>,
        saves: Mutex<Vec<PersistedState>>,
    }

    impl RecordingStore {
        fn saves(&self) -> Vec<PersistedState> {
            self.saves.lock().map(|s| s.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl StateStore for RecordingStore {
        async fn load(&self) -> anyhow::Result<Option<PersistedState>> {
            Ok(self.initial.clone())
        }

        async fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
            self.saves
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(state.clone());
            Ok(())
        }
    }

    /// Records the section count of each completed save; every write takes
    /// `delay`.
    struct SlowStore {
        delay: Duration,
        completed: Mutex<Vec<usize>>,
    }

    impl SlowStore {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                completed: Mutex::new(Vec::new()),
            }
        }

        fn completed(&self) -> Vec<usize> {
            self.completed.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl StateStore for SlowStore {
        async fn load(&self) -> anyhow::Result<Option<PersistedState>> {
            Ok(None)
        }

        async fn save(&self, state: &PersistedState) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            self.completed
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(state.sections.len());
            Ok(())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl StateStore for FailingStore {
        async fn load(&self) -> anyhow::Result<Option<PersistedState>> {
            anyhow::bail!("disk on fire")
        }

        async fn save(&self, _state: &PersistedState) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn chapter(title: &str, body: &str) -> Section {
        Section::Chapter(Chapter {
            title: title.to_owned(),
            body: body.to_owned(),
            ..Chapter::default()
        })
    }

    fn measure() -> SharedMeasure {
        Arc::new(UnitMeasure::with_capacity(3.0))
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_edits_coalesce_into_one_save() {
        let store = Arc::new(RecordingStore::default());
        let mut session =
            EditorSession::open(store.clone(), measure(), SessionConfig::default()).await;

        session.append(chapter("a", "x"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.append(chapter("b", "y"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(store.saves().is_empty());
        assert!(session.has_pending_save());

        tokio::time::sleep(Duration::from_millis(600)).await;
        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].sections.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn preview_publishes_after_quiet_period() -> anyhow::Result<()> {
        let store = Arc::new(RecordingStore::default());
        let mut session =
            EditorSession::open(store.clone(), measure(), SessionConfig::default()).await;
        let mut pages = session.pages();

        session.append(chapter("", "one two three four five"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        pages.changed().await?;
        let latest = pages.borrow_and_update().clone();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest.as_ref(), session.paginate_now().as_slice());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_cancels_pending_save() -> anyhow::Result<()> {
        let store = Arc::new(RecordingStore::default());
        let mut session =
            EditorSession::open(store.clone(), measure(), SessionConfig::default()).await;
        session.append(chapter("a", "x"));
        session.save_now().await?;
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(store.saves().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn close_flushes_pending_edit() -> anyhow::Result<()> {
        let store = Arc::new(RecordingStore::default());
        let mut session =
            EditorSession::open(store.clone(), measure(), SessionConfig::default()).await;
        session.append(chapter("a", "x"));
        session.close().await?;

        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].sections.len(), 1);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.saves().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_session_still_saves_pending_edit() {
        let store = Arc::new(RecordingStore::default());
        let mut session =
            EditorSession::open(store.clone(), measure(), SessionConfig::default()).await;
        session.append(chapter("a", "x"));
        drop(session);

        tokio::time::sleep(Duration::from_secs(5)).await;
        let saves = store.saves();
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].sections.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn save_in_progress_is_not_cut_short() {
        let store = Arc::new(SlowStore::new(Duration::from_millis(500)));
        let mut session =
            EditorSession::open(store.clone(), measure(), SessionConfig::default()).await;

        session.append(chapter("a", "x"));
        // The first save starts writing at 1000 ms.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        session.append(chapter("b", "y"));
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(store.completed(), [1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn save_now_waits_for_running_save() -> anyhow::Result<()> {
        let store = Arc::new(SlowStore::new(Duration::from_millis(500)));
        let mut session =
            EditorSession::open(store.clone(), measure(), SessionConfig::default()).await;

        session.append(chapter("a", "x"));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        session.append(chapter("b", "y"));
        session.save_now().await?;

        assert_eq!(store.completed(), [1, 2]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn load_failure_starts_empty() {
        let session =
            EditorSession::open(Arc::new(FailingStore), measure(), SessionConfig::default())
                .await;
        assert!(session.book().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn open_restores_persisted_book() {
        let store = Arc::new(RecordingStore {
            initial: Some(PersistedState {
                sections: vec![chapter("kept", "body")],
                active_tab: View::StoryPreview,
            }),
            ..RecordingStore::default()
        });
        let session = EditorSession::open(store, measure(), SessionConfig::default()).await;
        assert_eq!(session.book().len(), 1);
        assert_eq!(session.book().active_view(), View::StoryPreview);
    }
}
