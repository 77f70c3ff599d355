use std::collections::HashSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::backend::{CourseConfig, SpecializationInfo, Subject};
use crate::cache::{LookupCache, SemesterKey, SpecializationKey, SubjectKey};
use crate::config::SectionRules;

/// The user's current choice along each filter dimension. A downstream value
/// is only meaningful while every dimension to its left in the cascade order
/// (course, semester, specialization, section, subject) is set and valid.
/// Academic year and date range sit outside the cascade and only gate the
/// summary fetch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSelection {
    pub course: Option<String>,
    pub semester: Option<u32>,
    pub specialization: Option<String>,
    pub section: Option<String>,
    pub subject: Option<String>,
    pub academic_year: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl FilterSelection {
    pub fn is_empty(&self) -> bool {
        self.course.is_none()
            && self.semester.is_none()
            && self.specialization.is_none()
            && self.section.is_none()
            && self.subject.is_none()
            && self.academic_year.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

/// Snapshot written to the session store on every stable selection change and
/// read back once per session to seed the controller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedFilters {
    #[serde(flatten)]
    pub selection: FilterSelection,
    #[serde(default)]
    pub return_from_detail: bool,
}

/// A remote lookup the caller must execute, tagged with the input key it was
/// computed from. Results are handed back through the matching `apply_*`
/// method, which discards them if the key no longer matches the current
/// selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Fetch {
    Semesters(SemesterKey),
    Specializations(SpecializationKey),
    Subjects(SubjectKey),
}

/// What a mutation produced: lookups to run and advisory messages for the
/// user. Advisories are never fatal.
#[derive(Debug, Default, PartialEq)]
pub struct Outcome {
    pub fetches: Vec<Fetch>,
    pub advisories: Vec<String>,
}

impl Outcome {
    pub fn advise(&mut self, message: impl Into<String>) {
        self.advisories.push(message.into());
    }
}

/// Result of handing a completed lookup back to the controller.
#[derive(Debug, PartialEq)]
pub enum Applied {
    Applied(Outcome),
    /// The selection moved on while the lookup was in flight; the result was
    /// dropped without touching any state.
    Stale,
}

pub struct FilterController {
    course_config: CourseConfig,
    selection: FilterSelection,
    section_rules: SectionRules,

    semesters: Vec<u32>,
    specialization_info: Option<SpecializationInfo>,
    subjects: Vec<Subject>,
    section_options: Vec<String>,

    semester_cache: LookupCache<SemesterKey, Vec<u32>>,
    specialization_cache: LookupCache<SpecializationKey, SpecializationInfo>,
    subject_cache: LookupCache<SubjectKey, Vec<Subject>>,

    in_flight: HashSet<Fetch>,
    restoring: bool,
    filters_loaded: bool,
    pending_detail_fetch: bool,
    auto_fetch_ready: bool,
}

impl FilterController {
    pub fn new(section_rules: SectionRules) -> Self {
        let section_options = section_rules.default_sections.clone();
        Self {
            course_config: CourseConfig::new(),
            selection: FilterSelection::default(),
            section_rules,
            semesters: Vec::new(),
            specialization_info: None,
            subjects: Vec::new(),
            section_options,
            semester_cache: LookupCache::new(),
            specialization_cache: LookupCache::new(),
            subject_cache: LookupCache::new(),
            in_flight: HashSet::new(),
            restoring: false,
            filters_loaded: true,
            pending_detail_fetch: false,
            auto_fetch_ready: false,
        }
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn course_config(&self) -> &CourseConfig {
        &self.course_config
    }

    pub fn set_course_config(&mut self, config: CourseConfig) {
        self.course_config = config;
    }

    pub fn semesters(&self) -> &[u32] {
        &self.semesters
    }

    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    pub fn section_options(&self) -> &[String] {
        &self.section_options
    }

    pub fn specializations(&self) -> &[String] {
        self.specialization_info
            .as_ref()
            .map(|i| i.specializations.as_slice())
            .unwrap_or(&[])
    }

    /// True once the backend has told us whether this (course, semester) pair
    /// needs a specialization. Unknown until the lookup lands.
    pub fn specialization_resolved(&self) -> bool {
        self.specialization_info.is_some()
    }

    pub fn has_specializations(&self) -> bool {
        self.specialization_info
            .as_ref()
            .map(|i| i.has_specializations)
            .unwrap_or(false)
    }

    pub fn filters_loaded(&self) -> bool {
        self.filters_loaded
    }

    /// One-shot: true when a restore carrying `returnFromDetail` has confirmed
    /// the restored subject against the freshly fetched subject list. Reading
    /// it arms at most one automatic summary fetch.
    pub fn take_auto_fetch_ready(&mut self) -> bool {
        let ready = self.auto_fetch_ready;
        self.auto_fetch_ready = false;
        if ready {
            self.pending_detail_fetch = false;
        }
        ready
    }

    pub fn seed_subject_cache(&mut self, entries: Vec<(SubjectKey, Vec<Subject>)>) {
        for (key, subjects) in entries {
            self.subject_cache.set(key, subjects);
        }
    }

    /// The subject lookup key for the current selection, or None while the
    /// cascade has not resolved far enough to ask for subjects: course or
    /// semester missing, specialization requirement still unknown, or a
    /// required specialization not yet chosen.
    pub fn subject_key(&self) -> Option<SubjectKey> {
        let course = self.selection.course.as_ref()?;
        let semester = self.selection.semester?;
        let info = self.specialization_info.as_ref()?;
        let specialization = if info.has_specializations {
            Some(self.selection.specialization.clone()?)
        } else {
            None
        };
        Some(SubjectKey {
            course: course.clone(),
            semester,
            specialization,
            section: self.selection.section.clone(),
        })
    }

    fn is_current(&self, fetch: &Fetch) -> bool {
        match fetch {
            Fetch::Semesters(key) => self.selection.course.as_deref() == Some(key.course.as_str()),
            Fetch::Specializations(key) => {
                self.selection.course.as_deref() == Some(key.course.as_str())
                    && self.selection.semester == Some(key.semester)
            }
            Fetch::Subjects(key) => self.subject_key().as_ref() == Some(key),
        }
    }

    fn drop_superseded_in_flight(&mut self) {
        let keep: HashSet<Fetch> = self
            .in_flight
            .iter()
            .filter(|f| self.is_current(f))
            .cloned()
            .collect();
        self.in_flight = keep;
    }

    fn settle(&mut self) {
        if self.restoring && self.in_flight.is_empty() {
            self.restoring = false;
            self.filters_loaded = true;
        }
    }

    fn recompute_section_options(&mut self) {
        self.section_options = match (&self.selection.course, self.selection.semester) {
            (Some(course), Some(semester)) => self.section_rules.options_for(course, semester),
            _ => self.section_rules.default_sections.clone(),
        };
        if let Some(section) = &self.selection.section {
            if !self.section_options.contains(section) {
                self.selection.section = None;
            }
        }
    }

    fn issue_semesters(&mut self, out: &mut Outcome) {
        let Some(course) = self.selection.course.clone() else {
            return;
        };
        if !self.course_config.contains_key(&course) {
            return;
        }
        let key = SemesterKey { course };
        if let Some(cached) = self.semester_cache.get(&key).cloned() {
            let followup = self.accept_semesters(cached);
            merge(out, followup);
            return;
        }
        let fetch = Fetch::Semesters(key);
        if self.in_flight.insert(fetch.clone()) {
            out.fetches.push(fetch);
        }
    }

    fn issue_specializations(&mut self, out: &mut Outcome) {
        let (Some(course), Some(semester)) =
            (self.selection.course.clone(), self.selection.semester)
        else {
            return;
        };
        if !self.course_config.contains_key(&course) {
            return;
        }
        let key = SpecializationKey { course, semester };
        if let Some(cached) = self.specialization_cache.get(&key).cloned() {
            let followup = self.accept_specializations(cached);
            merge(out, followup);
            return;
        }
        let fetch = Fetch::Specializations(key);
        if self.in_flight.insert(fetch.clone()) {
            out.fetches.push(fetch);
        }
    }

    fn issue_subjects(&mut self, out: &mut Outcome) {
        let Some(key) = self.subject_key() else {
            // Not resolvable yet; the list must stay empty.
            self.subjects.clear();
            return;
        };
        if let Some(cached) = self.subject_cache.get(&key).cloned() {
            let followup = self.accept_subjects(cached);
            merge(out, followup);
            return;
        }
        let fetch = Fetch::Subjects(key);
        if self.in_flight.insert(fetch.clone()) {
            out.fetches.push(fetch);
        }
    }

    pub fn set_course(&mut self, course: Option<String>) -> Outcome {
        let mut out = Outcome::default();
        if self.selection.course == course {
            return out;
        }
        let old = self.selection.course.take();

        // Left-to-right reset before any new fetch is issued.
        self.selection.course = course.clone();
        self.selection.semester = None;
        self.selection.specialization = None;
        self.selection.section = None;
        self.selection.subject = None;
        self.semesters.clear();
        self.specialization_info = None;
        self.subjects.clear();
        self.recompute_section_options();

        // Drop every cached lookup tied to the old course so a later
        // reselection goes back to the network.
        if let Some(old) = old {
            self.semester_cache.retain(|k, _| k.course != old);
            self.specialization_cache.retain(|k, _| k.course != old);
            self.subject_cache.retain(|k, _| k.course != old);
        }
        self.drop_superseded_in_flight();

        if let Some(course) = &course {
            if self.course_config.contains_key(course) {
                self.issue_semesters(&mut out);
            } else {
                out.advise(format!("Course {} is not in the loaded configuration", course));
            }
        }
        out
    }

    pub fn set_semester(&mut self, semester: Option<u32>) -> Outcome {
        let mut out = Outcome::default();
        if self.selection.semester == semester {
            return out;
        }
        if let Some(value) = semester {
            if !self.semesters.is_empty() && !self.semesters.contains(&value) {
                out.advise(format!("Semester {} is not available for this course", value));
                return out;
            }
        }
        self.selection.semester = semester;
        self.selection.specialization = None;
        self.selection.section = None;
        self.selection.subject = None;
        self.specialization_info = None;
        self.subjects.clear();
        self.recompute_section_options();
        self.drop_superseded_in_flight();

        if semester.is_some() {
            self.issue_specializations(&mut out);
        }
        out
    }

    pub fn set_specialization(&mut self, specialization: Option<String>) -> Outcome {
        let mut out = Outcome::default();
        if self.selection.specialization == specialization {
            return out;
        }
        if let Some(value) = &specialization {
            if let Some(info) = &self.specialization_info {
                if info.has_specializations && !info.specializations.contains(value) {
                    out.advise(format!("Specialization {} is not available", value));
                    return out;
                }
            }
        }
        self.selection.specialization = specialization;
        self.selection.subject = None;
        self.subjects.clear();
        self.drop_superseded_in_flight();
        self.issue_subjects(&mut out);
        out
    }

    pub fn set_section(&mut self, section: Option<String>) -> Outcome {
        let mut out = Outcome::default();
        if self.selection.section == section {
            return out;
        }
        if let Some(value) = &section {
            if !self.section_options.contains(value) {
                out.advise(format!("Section {} is not offered here", value));
                return out;
            }
        }
        self.selection.section = section;
        // The subject list is keyed on section, so the selected subject can
        // no longer be trusted against the new key.
        self.selection.subject = None;
        self.subjects.clear();
        self.drop_superseded_in_flight();
        self.issue_subjects(&mut out);
        out
    }

    pub fn set_subject(&mut self, subject: Option<String>) -> Outcome {
        let mut out = Outcome::default();
        match subject {
            None => {
                self.selection.subject = None;
            }
            Some(code) => {
                if self.subjects.iter().any(|s| s.code == code) {
                    self.selection.subject = Some(code);
                } else {
                    out.advise(format!("Subject {} is not in the resolved subject list", code));
                }
            }
        }
        out
    }

    pub fn set_academic_year(&mut self, academic_year: Option<String>) -> Outcome {
        let mut out = Outcome::default();
        match academic_year {
            None => {
                self.selection.academic_year = None;
            }
            Some(year) => {
                if crate::summary::normalize_academic_year(&year).is_some() {
                    self.selection.academic_year = Some(year);
                } else {
                    out.advise(format!(
                        "Academic year {} is not in YYYY-YYYY or YYYY-YY form",
                        year
                    ));
                }
            }
        }
        out
    }

    pub fn set_date_range(
        &mut self,
        start_date: Option<String>,
        end_date: Option<String>,
    ) -> Outcome {
        let mut out = Outcome::default();
        match (start_date, end_date) {
            (None, None) => {
                self.selection.start_date = None;
                self.selection.end_date = None;
            }
            (Some(start), Some(end)) => {
                let parsed_start = NaiveDate::parse_from_str(&start, "%Y-%m-%d");
                let parsed_end = NaiveDate::parse_from_str(&end, "%Y-%m-%d");
                match (parsed_start, parsed_end) {
                    (Ok(s), Ok(e)) if s <= e => {
                        self.selection.start_date = Some(start);
                        self.selection.end_date = Some(end);
                    }
                    (Ok(s), Ok(e)) => {
                        out.advise(format!("Date range {} to {} is inverted", s, e));
                    }
                    _ => {
                        out.advise("Dates must be in YYYY-MM-DD form");
                    }
                }
            }
            _ => {
                out.advise("Provide both start and end dates, or neither");
            }
        }
        out
    }

    /// Seed every field from the persisted snapshot in one pass, then start
    /// the lookups the seeded values need. `filters_loaded` turns true only
    /// once none of those lookups remain in flight.
    pub fn restore(&mut self, persisted: PersistedFilters) -> Outcome {
        let mut out = Outcome::default();
        if persisted.selection.course.is_none() {
            self.filters_loaded = true;
            return out;
        }

        self.selection = persisted.selection;
        self.semesters.clear();
        self.specialization_info = None;
        self.subjects.clear();
        self.recompute_section_options();

        self.restoring = true;
        self.filters_loaded = false;
        self.pending_detail_fetch = persisted.return_from_detail;
        self.auto_fetch_ready = false;

        let known = self
            .selection
            .course
            .as_ref()
            .map(|c| self.course_config.contains_key(c))
            .unwrap_or(false);
        if known {
            self.issue_semesters(&mut out);
            self.issue_specializations(&mut out);
        } else if let Some(course) = &self.selection.course {
            out.advise(format!("Saved course {} is no longer available", course));
        }
        self.settle();
        out
    }

    pub fn clear(&mut self) {
        self.selection = FilterSelection::default();
        self.semesters.clear();
        self.specialization_info = None;
        self.subjects.clear();
        self.semester_cache.clear();
        self.specialization_cache.clear();
        self.subject_cache.clear();
        self.in_flight.clear();
        self.restoring = false;
        self.filters_loaded = true;
        self.pending_detail_fetch = false;
        self.auto_fetch_ready = false;
        self.recompute_section_options();
    }

    pub fn apply_semesters(&mut self, key: SemesterKey, semesters: Vec<u32>) -> Applied {
        let fetch = Fetch::Semesters(key.clone());
        self.in_flight.remove(&fetch);
        if !self.is_current(&fetch) {
            self.settle();
            return Applied::Stale;
        }
        self.semester_cache.set(key, semesters.clone());
        let out = self.accept_semesters(semesters);
        self.settle();
        Applied::Applied(out)
    }

    fn accept_semesters(&mut self, semesters: Vec<u32>) -> Outcome {
        let mut out = Outcome::default();
        self.semesters = semesters;
        if self.semesters.is_empty() {
            out.advise("No semesters available for the selected course");
        }
        if let Some(current) = self.selection.semester {
            if !self.semesters.contains(&current) {
                out.advise(format!("Semester {} is no longer available", current));
                let followup = self.set_semester(None);
                merge(&mut out, followup);
                return out;
            }
            // Semester survived validation; continue the cascade.
            self.issue_specializations(&mut out);
        }
        out
    }

    pub fn apply_specializations(
        &mut self,
        key: SpecializationKey,
        info: SpecializationInfo,
    ) -> Applied {
        let fetch = Fetch::Specializations(key.clone());
        self.in_flight.remove(&fetch);
        if !self.is_current(&fetch) {
            self.settle();
            return Applied::Stale;
        }
        self.specialization_cache.set(key, info.clone());
        let out = self.accept_specializations(info);
        self.settle();
        Applied::Applied(out)
    }

    fn accept_specializations(&mut self, info: SpecializationInfo) -> Outcome {
        let mut out = Outcome::default();
        if !info.has_specializations {
            // Nothing to pick; clear immediately rather than waiting on the
            // user.
            self.selection.specialization = None;
        } else if let Some(current) = &self.selection.specialization {
            if !info.specializations.contains(current) {
                out.advise(format!("Specialization {} is no longer available", current));
                self.selection.specialization = None;
                self.selection.subject = None;
                self.subjects.clear();
            }
        }
        self.specialization_info = Some(info);
        self.issue_subjects(&mut out);
        out
    }

    pub fn apply_subjects(&mut self, key: SubjectKey, subjects: Vec<Subject>) -> Applied {
        let fetch = Fetch::Subjects(key.clone());
        self.in_flight.remove(&fetch);
        if !self.is_current(&fetch) {
            self.settle();
            return Applied::Stale;
        }
        self.subject_cache.set(key, subjects.clone());
        let out = self.accept_subjects(subjects);
        self.settle();
        Applied::Applied(out)
    }

    fn accept_subjects(&mut self, subjects: Vec<Subject>) -> Outcome {
        let mut out = Outcome::default();
        self.subjects = subjects;
        if self.subjects.is_empty() {
            out.advise("No subjects found for the selected course and semester");
        }
        if let Some(current) = self.selection.subject.clone() {
            if self.subjects.iter().any(|s| s.code == current) {
                if self.pending_detail_fetch {
                    self.auto_fetch_ready = true;
                }
            } else {
                out.advise(format!("Subject {} is no longer offered", current));
                self.selection.subject = None;
            }
        }
        out
    }

    /// A lookup failed. If it was for the current selection the matching list
    /// is left empty; a stale failure is ignored entirely. Returns whether the
    /// failure was current so the caller can surface one advisory.
    pub fn fail_fetch(&mut self, fetch: &Fetch) -> bool {
        self.in_flight.remove(fetch);
        let current = self.is_current(fetch);
        if current {
            match fetch {
                Fetch::Semesters(_) => self.semesters.clear(),
                Fetch::Specializations(_) => self.specialization_info = None,
                Fetch::Subjects(_) => self.subjects.clear(),
            }
        }
        self.settle();
        current
    }
}

fn merge(into: &mut Outcome, from: Outcome) {
    into.fetches.extend(from.fetches);
    into.advisories.extend(from.advisories);
}
