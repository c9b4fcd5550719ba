use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::question::{QuestionDetails, QuizQuestion};

/// Reshuffles allowed before falling back to a forced swap.
pub const MAX_RESHUFFLE_ATTEMPTS: usize = 5;

pub fn shuffle_choices(questions: &mut [QuizQuestion]) {
    shuffle_choices_with_rng(questions, &mut rand::thread_rng());
}

/// Shuffles each multiple-choice question's choices independently, steering the
/// correct answer away from the slot the previous question used.
///
/// Questions that are not multiple choice, have fewer than two choices or carry
/// an out-of-range `correct_index` are left as they are and do not reset the
/// tracked position.
pub fn shuffle_choices_with_rng<R: Rng + ?Sized>(questions: &mut [QuizQuestion], rng: &mut R) {
    let mut previous: Option<usize> = None;

    for question in questions.iter_mut() {
        let QuestionDetails::MultipleChoice(mc) = &mut question.details else {
            continue;
        };
        if mc.choices.len() < 2 || mc.correct_index >= mc.choices.len() {
            continue;
        }

        let correct_index = mc.correct_index;
        let mut tagged: Vec<(bool, String)> = mc
            .choices
            .drain(..)
            .enumerate()
            .map(|(i, choice)| (i == correct_index, choice))
            .collect();

        let mut index = reshuffle(&mut tagged, rng);
        let mut attempts = 1;
        while Some(index) == previous && attempts < MAX_RESHUFFLE_ATTEMPTS {
            index = reshuffle(&mut tagged, rng);
            attempts += 1;
        }

        if Some(index) == previous {
            let target = (index + 1) % tagged.len();
            tagged.swap(index, target);
            index = target;
        }

        mc.choices = tagged.into_iter().map(|(_, choice)| choice).collect();
        mc.correct_index = index;
        previous = Some(index);
    }
}

fn reshuffle<R: Rng + ?Sized>(tagged: &mut [(bool, String)], rng: &mut R) -> usize {
    tagged.shuffle(rng);
    tagged.iter().position(|(correct, _)| *correct).unwrap_or(0)
}
