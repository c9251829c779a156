use std::collections::VecDeque;

use log::warn;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use thiserror::Error;

use crate::atlas::{RegionKind, Structure};

/// Points awarded for finding the expected structure.
pub const CORRECT_POINTS: u32 = 10;
/// Points deducted for a wrong pick, saturating at zero.
pub const INCORRECT_PENALTY: u32 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuizError {
    #[error("atlas contains no interactive structures to quiz on")]
    NoInteractiveStructures,
}

/// Quiz progression. Modes advance linearly and wrap back to free explore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuizMode {
    #[default]
    FreeExplore,
    LobeIdentification,
    StructureFunctionMatch,
    NerveKnowledgeQuiz,
}

impl QuizMode {
    pub fn next(self) -> Self {
        match self {
            Self::FreeExplore => Self::LobeIdentification,
            Self::LobeIdentification => Self::StructureFunctionMatch,
            Self::StructureFunctionMatch => Self::NerveKnowledgeQuiz,
            Self::NerveKnowledgeQuiz => Self::FreeExplore,
        }
    }

    pub fn region(self) -> Option<RegionKind> {
        match self {
            Self::FreeExplore => None,
            Self::LobeIdentification => Some(RegionKind::Lobe),
            Self::StructureFunctionMatch => Some(RegionKind::DeepStructure),
            Self::NerveKnowledgeQuiz => Some(RegionKind::CranialNerve),
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::FreeExplore => "Free explore",
            Self::LobeIdentification => "Lobe identification",
            Self::StructureFunctionMatch => "Structure-function match",
            Self::NerveKnowledgeQuiz => "Cranial nerve quiz",
        }
    }
}

/// One pending task: the structure to find and the prompt shown for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub expected: String,
    pub prompt: String,
}

/// Outcome of evaluating a pick against the current task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Free explore, no active task, or a click that hit nothing.
    Ignored,
    Correct {
        found: String,
        /// Set when this answer exhausted the queue and moved to a new mode.
        advanced_to: Option<QuizMode>,
    },
    Incorrect {
        clicked: String,
    },
}

/// Finite-state quiz controller: one mode, one shuffled task queue, one
/// expected answer at a time.
#[derive(Debug)]
pub struct QuizController {
    catalog: Vec<Structure>,
    mode: QuizMode,
    queue: VecDeque<Task>,
    score: u32,
    rng: StdRng,
}

impl QuizController {
    /// Builds a controller over the interactive structures of the atlas.
    /// A `seed` makes the task order reproducible.
    pub fn new(structures: &[Structure], seed: Option<u64>) -> Result<Self, QuizError> {
        let catalog: Vec<Structure> = structures
            .iter()
            .filter(|s| s.is_interactive())
            .cloned()
            .collect();
        if catalog.is_empty() {
            return Err(QuizError::NoInteractiveStructures);
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        };
        Ok(Self {
            catalog,
            mode: QuizMode::FreeExplore,
            queue: VecDeque::new(),
            score: 0,
            rng,
        })
    }

    pub fn mode(&self) -> QuizMode {
        self.mode
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    /// The current expected answer, if a quiz mode is running.
    pub fn current_task(&self) -> Option<&Task> {
        self.queue.front()
    }

    /// Advances to the next mode with a fresh shuffled queue, skipping modes
    /// whose structure pool is empty. Returns the mode that became active.
    pub fn advance_mode(&mut self) -> QuizMode {
        loop {
            self.mode = self.mode.next();
            let Some(region) = self.mode.region() else {
                // Wrapped back to free explore.
                self.queue.clear();
                return self.mode;
            };
            let mut tasks = self.tasks_for(region);
            if tasks.is_empty() {
                warn!("no {} structures in atlas, skipping mode", region.label());
                continue;
            }
            tasks.shuffle(&mut self.rng);
            self.queue = tasks.into();
            return self.mode;
        }
    }

    /// Evaluates a clicked structure against the current expected answer.
    pub fn answer(&mut self, clicked: Option<&str>) -> Verdict {
        let Some(task) = self.queue.front() else {
            return Verdict::Ignored;
        };
        let Some(clicked) = clicked else {
            return Verdict::Ignored;
        };

        if clicked == task.expected {
            let found = self
                .queue
                .pop_front()
                .map(|task| task.expected)
                .unwrap_or_default();
            self.score += CORRECT_POINTS;
            let advanced_to = self.queue.is_empty().then(|| self.advance_mode());
            Verdict::Correct { found, advanced_to }
        } else {
            self.score = self.score.saturating_sub(INCORRECT_PENALTY);
            Verdict::Incorrect {
                clicked: clicked.to_string(),
            }
        }
    }

    fn tasks_for(&self, region: RegionKind) -> Vec<Task> {
        self.catalog
            .iter()
            .filter(|s| s.region == Some(region))
            .map(|s| Task {
                expected: s.name.clone(),
                prompt: prompt_for(self.mode, s),
            })
            .collect()
    }
}

fn prompt_for(mode: QuizMode, structure: &Structure) -> String {
    match mode {
        QuizMode::StructureFunctionMatch => match &structure.function {
            Some(function) => format!("Which structure is responsible for: {function}?"),
            None => format!("Find the {}", structure.name),
        },
        QuizMode::NerveKnowledgeQuiz => match &structure.nerve_info {
            Some(info) => format!("Find the nerve described by: {info}"),
            None => format!("Find the {}", structure.name),
        },
        _ => format!("Find the {}", structure.name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn structure(name: &str, region: RegionKind) -> Structure {
        Structure {
            name: name.to_string(),
            region: Some(region),
            function: (region == RegionKind::DeepStructure)
                .then(|| format!("{name} duties")),
            nerve_info: (region == RegionKind::CranialNerve)
                .then(|| format!("{name} carries signals")),
            ..Structure::default()
        }
    }

    fn sample_catalog() -> Vec<Structure> {
        vec![
            structure("Frontal Lobe", RegionKind::Lobe),
            structure("Parietal Lobe", RegionKind::Lobe),
            structure("Thalamus", RegionKind::DeepStructure),
            structure("Optic Nerve", RegionKind::CranialNerve),
        ]
    }

    fn controller() -> QuizController {
        QuizController::new(&sample_catalog(), Some(7)).unwrap()
    }

    #[test]
    fn starts_in_free_explore_with_no_task() {
        let quiz = controller();
        assert_eq!(quiz.mode(), QuizMode::FreeExplore);
        assert!(quiz.current_task().is_none());
        assert_eq!(quiz.score(), 0);
    }

    #[test]
    fn free_explore_clicks_are_ignored() {
        let mut quiz = controller();
        assert_eq!(quiz.answer(Some("Frontal Lobe")), Verdict::Ignored);
        assert_eq!(quiz.score(), 0);
    }

    #[test]
    fn correct_answer_scores_and_shrinks_queue() {
        let mut quiz = controller();
        quiz.advance_mode();
        assert_eq!(quiz.mode(), QuizMode::LobeIdentification);
        assert_eq!(quiz.remaining(), 2);

        let expected = quiz.current_task().unwrap().expected.clone();
        let verdict = quiz.answer(Some(&expected));
        assert!(matches!(verdict, Verdict::Correct { ref found, advanced_to: None } if *found == expected));
        assert_eq!(quiz.score(), CORRECT_POINTS);
        assert_eq!(quiz.remaining(), 1);
    }

    #[test]
    fn incorrect_answer_deducts_and_keeps_queue() {
        let mut quiz = controller();
        quiz.advance_mode();
        let expected = quiz.current_task().unwrap().expected.clone();
        let wrong = if expected == "Frontal Lobe" {
            "Parietal Lobe"
        } else {
            "Frontal Lobe"
        };

        let verdict = quiz.answer(Some(wrong));
        assert_eq!(
            verdict,
            Verdict::Incorrect {
                clicked: wrong.to_string()
            }
        );
        // Floored at zero from a zero score.
        assert_eq!(quiz.score(), 0);
        assert_eq!(quiz.remaining(), 2);
        assert_eq!(quiz.current_task().unwrap().expected, expected);
    }

    #[test]
    fn missed_clicks_leave_score_and_queue_unchanged() {
        let mut quiz = controller();
        quiz.advance_mode();
        let expected = quiz.current_task().unwrap().expected.clone();

        assert_eq!(quiz.answer(None), Verdict::Ignored);
        assert_eq!(quiz.score(), 0);
        assert_eq!(quiz.remaining(), 2);
        assert_eq!(quiz.current_task().unwrap().expected, expected);
    }

    #[test]
    fn score_never_goes_negative() {
        let mut quiz = controller();
        quiz.advance_mode();
        for _ in 0..5 {
            quiz.answer(Some("Thalamus"));
        }
        assert_eq!(quiz.score(), 0);
    }

    #[test]
    fn repeating_a_found_structure_is_incorrect() {
        let mut quiz = controller();
        quiz.advance_mode();
        let first = quiz.current_task().unwrap().expected.clone();
        quiz.answer(Some(&first));
        let verdict = quiz.answer(Some(&first));
        assert_eq!(verdict, Verdict::Incorrect { clicked: first });
        assert_eq!(quiz.score(), CORRECT_POINTS - INCORRECT_PENALTY);
    }

    #[test]
    fn exhausting_a_queue_advances_the_mode() {
        let mut quiz = controller();
        quiz.advance_mode();
        let mut advanced = None;
        for _ in 0..2 {
            let expected = quiz.current_task().unwrap().expected.clone();
            if let Verdict::Correct { advanced_to, .. } = quiz.answer(Some(&expected)) {
                advanced = advanced_to;
            }
        }
        assert_eq!(advanced, Some(QuizMode::StructureFunctionMatch));
        assert_eq!(quiz.mode(), QuizMode::StructureFunctionMatch);
        assert_eq!(quiz.remaining(), 1);
    }

    #[test]
    fn modes_wrap_back_to_free_explore() {
        let mut quiz = controller();
        quiz.advance_mode(); // lobes
        quiz.advance_mode(); // deep structures
        quiz.advance_mode(); // nerves
        assert_eq!(quiz.mode(), QuizMode::NerveKnowledgeQuiz);
        assert_eq!(quiz.advance_mode(), QuizMode::FreeExplore);
        assert!(quiz.current_task().is_none());
    }

    #[test]
    fn empty_regions_are_skipped() {
        let catalog = vec![structure("Optic Nerve", RegionKind::CranialNerve)];
        let mut quiz = QuizController::new(&catalog, Some(1)).unwrap();
        assert_eq!(quiz.advance_mode(), QuizMode::NerveKnowledgeQuiz);
    }

    #[test]
    fn prompts_use_function_and_nerve_metadata() {
        let mut quiz = controller();
        quiz.advance_mode();
        quiz.advance_mode();
        assert_eq!(quiz.mode(), QuizMode::StructureFunctionMatch);
        let prompt = &quiz.current_task().unwrap().prompt;
        assert!(prompt.contains("Thalamus duties"), "prompt was {prompt}");
    }

    #[test]
    fn seeded_controllers_agree_on_task_order() {
        let mut a = QuizController::new(&sample_catalog(), Some(42)).unwrap();
        let mut b = QuizController::new(&sample_catalog(), Some(42)).unwrap();
        a.advance_mode();
        b.advance_mode();
        assert_eq!(a.current_task(), b.current_task());
    }

    #[test]
    fn atlas_without_interactive_structures_is_an_error() {
        let decorative = vec![Structure {
            name: "Head Shell".into(),
            ..Structure::default()
        }];
        assert_eq!(
            QuizController::new(&decorative, None).unwrap_err(),
            QuizError::NoInteractiveStructures
        );
    }
}
