//! Rayon or sequential execution behind one import.
//!
//! With the `parallel` feature this is rayon's prelude. Without it, ranges and
//! vectors get an `into_par_iter()` that is plain `into_iter()`, so the same
//! `.map(..).collect()` chains compile either way. Every call site collects
//! into an ordered `Vec`, which keeps results identical across both builds.
#[cfg(feature = "parallel")]
pub use rayon::prelude::*;

#[cfg(not(feature = "parallel"))]
mod sequential {
    pub trait IntoParallelIterator {
        type Iter;
        type Item;
        fn into_par_iter(self) -> Self::Iter;
    }

    impl<I: IntoIterator> IntoParallelIterator for I {
        type Iter = I::IntoIter;
        type Item = I::Item;
        fn into_par_iter(self) -> Self::Iter {
            self.into_iter()
        }
    }
}

#[cfg(not(feature = "parallel"))]
pub use sequential::*;
