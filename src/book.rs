use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::section::Section;
use crate::store::PersistedState;

/// Stable identity of a section within a [`Book`]. Generated when the section
/// enters the book; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectionId(Uuid);

impl SectionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum View {
    #[serde(rename = "work")]
    WorkEditor,
    #[serde(rename = "html")]
    HtmlEditor,
    #[serde(rename = "story")]
    StoryPreview,
    #[default]
    #[serde(rename = "chapter", other)]
    ChapterEditor,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BookEntry {
    id: SectionId,
    section: Section,
}

impl BookEntry {
    pub fn id(&self) -> SectionId {
        self.id
    }

    pub fn section(&self) -> &Section {
        &self.section
    }
}

/// Ordered sections plus the transient editor state around them.
///
/// Legacy newspaper sections never live in a book: they are converted to HTML
/// snippets on every way in.
#[derive(Debug, Clone, Default)]
pub struct Book {
    entries: Vec<BookEntry>,
    active_view: View,
    editing: Option<SectionId>,
}

impl Book {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: &PersistedState) -> Self {
        let entries = state
            .sections
            .iter()
            .cloned()
            .map(|section| BookEntry {
                id: SectionId::new(),
                section: section.into_current(),
            })
            .collect();
        Self {
            entries,
            active_view: state.active_tab,
            editing: None,
        }
    }

    pub fn to_state(&self) -> PersistedState {
        PersistedState {
            sections: self.sections().cloned().collect(),
            active_tab: self.active_view,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BookEntry] {
        &self.entries
    }

    pub fn sections(&self) -> impl Iterator<Item = &Section> {
        self.entries.iter().map(|entry| &entry.section)
    }

    pub fn get(&self, id: SectionId) -> Option<&Section> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| &entry.section)
    }

    pub fn position(&self, id: SectionId) -> Option<usize> {
        self.entries.iter().position(|entry| entry.id == id)
    }

    pub fn active_view(&self) -> View {
        self.active_view
    }

    pub fn set_active_view(&mut self, view: View) {
        self.active_view = view;
    }

    pub fn append(&mut self, section: Section) -> SectionId {
        let id = SectionId::new();
        self.entries.push(BookEntry {
            id,
            section: section.into_current(),
        });
        id
    }

    pub fn remove(&mut self, id: SectionId) -> anyhow::Result<Section> {
        let idx = self.require(id)?;
        if self.editing == Some(id) {
            self.editing = None;
        }
        Ok(self.entries.remove(idx).section)
    }

    /// Swaps the section with its predecessor. No-op for the first section.
    pub fn move_up(&mut self, id: SectionId) -> anyhow::Result<()> {
        let idx = self.require(id)?;
        if idx > 0 {
            self.entries.swap(idx, idx - 1);
        }
        Ok(())
    }

    /// Swaps the section with its successor. No-op for the last section.
    pub fn move_down(&mut self, id: SectionId) -> anyhow::Result<()> {
        let idx = self.require(id)?;
        if idx + 1 < self.entries.len() {
            self.entries.swap(idx, idx + 1);
        }
        Ok(())
    }

    pub fn editing(&self) -> Option<SectionId> {
        self.editing
    }

    pub fn begin_edit(&mut self, id: SectionId) -> anyhow::Result<&Section> {
        let idx = self.require(id)?;
        self.editing = Some(id);
        Ok(&self.entries[idx].section)
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Replaces the section being edited, keeping the edit open.
    pub fn update_editing(&mut self, section: Section) -> anyhow::Result<()> {
        let Some(id) = self.editing else {
            anyhow::bail!("no section is being edited");
        };
        let idx = self.require(id)?;
        let entry = &mut self.entries[idx];
        if entry.section.kind() != section.kind() {
            anyhow::bail!(
                "edited section is a {:?}, not a {:?}",
                entry.section.kind(),
                section.kind()
            );
        }
        entry.section = section.into_current();
        Ok(())
    }

    /// Stores `section`: replaces the section being edited when it has the same
    /// kind, otherwise appends. Always ends the edit.
    pub fn commit(&mut self, section: Section) -> SectionId {
        let target = self
            .editing
            .take()
            .and_then(|id| self.position(id).map(|idx| (id, idx)))
            .filter(|&(_, idx)| self.entries[idx].section.kind() == section.kind());

        match target {
            Some((id, idx)) => {
                self.entries[idx].section = section.into_current();
                id
            }
            None => self.append(section),
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.editing = None;
        self.active_view = View::default();
    }

    fn require(&self, id: SectionId) -> anyhow::Result<usize> {
        self.position(id)
            .ok_or_else(|| anyhow::anyhow!("section not found: {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::section::{Article, Chapter, HtmlSnippet, Newspaper, SectionKind, Work};

    fn chapter(title: &str) -> Section {
        Section::Chapter(Chapter {
            title: title.to_owned(),
            ..Chapter::default()
        })
    }

    fn titles(book: &Book) -> Vec<&str> {
        book.sections().map(Section::display_title).collect()
    }

    #[test]
    fn edit_target_follows_section_across_swaps() -> anyhow::Result<()> {
        let mut book = Book::new();
        let a = book.append(chapter("a"));
        let b = book.append(chapter("b"));
        let c = book.append(chapter("c"));

        book.begin_edit(b)?;
        book.move_up(b)?;
        book.move_down(a)?;
        assert_eq!(titles(&book), ["b", "c", "a"]);

        book.update_editing(chapter("b2"))?;
        assert_eq!(titles(&book), ["b2", "c", "a"]);
        assert_eq!(book.editing(), Some(b));

        book.move_up(b)?;
        book.move_down(c)?;
        book.move_down(c)?;
        assert_eq!(titles(&book), ["b2", "a", "c"]);
        Ok(())
    }

    #[test]
    fn removing_edited_section_clears_edit() -> anyhow::Result<()> {
        let mut book = Book::new();
        let a = book.append(chapter("a"));
        let b = book.append(chapter("b"));
        book.begin_edit(a)?;
        book.remove(b)?;
        assert_eq!(book.editing(), Some(a));
        book.remove(a)?;
        assert_eq!(book.editing(), None);
        assert!(book.is_empty());
        assert!(book.remove(a).is_err());
        Ok(())
    }

    #[test]
    fn commit_replaces_same_kind_or_appends() -> anyhow::Result<()> {
        let mut book = Book::new();
        let a = book.append(chapter("a"));

        book.begin_edit(a)?;
        let id = book.commit(chapter("a2"));
        assert_eq!(id, a);
        assert_eq!(book.editing(), None);

        book.begin_edit(a)?;
        let work = book.commit(Section::Work(Work::default()));
        assert_ne!(work, a);
        assert_eq!(titles(&book), ["a2", "Minor/Major Work"]);
        Ok(())
    }

    #[test]
    fn update_editing_rejects_other_kinds() -> anyhow::Result<()> {
        let mut book = Book::new();
        let a = book.append(chapter("a"));
        assert!(book.update_editing(chapter("x")).is_err());
        book.begin_edit(a)?;
        let err = book
            .update_editing(Section::Html(HtmlSnippet::capture(
                "h",
                "<p>x</p>",
                Default::default(),
            )))
            .unwrap_err();
        assert!(err.to_string().contains("edited section"));
        Ok(())
    }

    #[test]
    fn newspapers_never_enter_the_book() {
        let mut book = Book::new();
        book.append(Section::Newspaper(Newspaper {
            title: "Daily".to_owned(),
            articles: vec![Article::default()],
            ..Newspaper::default()
        }));
        assert!(book.sections().all(|s| s.kind() != SectionKind::Newspaper));
        assert_eq!(titles(&book), ["Daily"]);
    }

    #[test]
    fn moves_at_boundaries_are_noops() -> anyhow::Result<()> {
        let mut book = Book::new();
        let a = book.append(chapter("a"));
        let b = book.append(chapter("b"));
        book.move_up(a)?;
        book.move_down(b)?;
        assert_eq!(titles(&book), ["a", "b"]);
        Ok(())
    }

    #[test]
    fn view_parses_persisted_names() -> anyhow::Result<()> {
        let view: View = serde_json::from_str("\"story\"")?;
        assert_eq!(view, View::StoryPreview);
        let view: View = serde_json::from_str("\"somewhere\"")?;
        assert_eq!(view, View::ChapterEditor);
        assert_eq!(serde_json::to_string(&View::HtmlEditor)?, "\"html\"");
        Ok(())
    }
}
