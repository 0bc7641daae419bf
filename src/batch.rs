use crate::error::EvaluationError;
use crate::evaluator::Evaluator;
use crate::request::Request;

/// A fixed-size tuple of requests that can be evaluated together.
///
/// The requests are evaluated strictly from left to right and each one yields
/// its own result, so a failing request does not stop the ones after it.
pub trait Batch {
    /// A tuple with one result per request.
    type Output;

    /// Evaluate all requests in order.
    fn evaluate_with(self, evaluator: &mut Evaluator) -> Self::Output;
}

macro_rules! batch {
    ($($param:tt $idx:tt),*) => {
        impl<$($param: Request),*> Batch for ($($param,)*) {
            type Output = ($(Result<$param::Output, EvaluationError>,)*);

            fn evaluate_with(self, evaluator: &mut Evaluator) -> Self::Output {
                ($(evaluator.evaluate(self.$idx),)*)
            }
        }
    };
}

batch! { A 0 }
batch! { A 0, B 1 }
batch! { A 0, B 1, C 2 }
batch! { A 0, B 1, C 2, D 3 }
batch! { A 0, B 1, C 2, D 3, E 4 }
batch! { A 0, B 1, C 2, D 3, E 4, F 5 }
batch! { A 0, B 1, C 2, D 3, E 4, F 5, G 6 }
batch! { A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7 }
batch! { A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8 }
batch! { A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9 }
batch! { A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10 }
batch! { A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7, I 8, J 9, K 10, L 11 }
