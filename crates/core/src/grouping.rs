/// Groups consecutive items into runs.
///
/// An item joins the current run when `same(last_appended, item)` holds;
/// otherwise the run is emitted and a new one starts with the item. Every
/// input item ends up in exactly one non-empty group, the trailing one included.
pub struct CollectUntilChanged<I: Iterator, F> {
    iter: I,
    same: F,
    pending: Option<Vec<I::Item>>,
}

impl<I, F> Iterator for CollectUntilChanged<I, F>
where
    I: Iterator,
    F: FnMut(&I::Item, &I::Item) -> bool,
{
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let Some(item) = self.iter.next() else {
                return self.pending.take();
            };

            match self.pending.as_mut() {
                None => self.pending = Some(vec![item]),
                Some(group) => {
                    let joins = group
                        .last()
                        .is_some_and(|last| (self.same)(last, &item));
                    if joins {
                        group.push(item);
                    } else {
                        return self.pending.replace(vec![item]);
                    }
                }
            }
        }
    }
}

pub trait GroupingExt: Iterator + Sized {
    fn collect_until_changed<F>(self, same: F) -> CollectUntilChanged<Self, F>
    where
        F: FnMut(&Self::Item, &Self::Item) -> bool,
    {
        CollectUntilChanged {
            iter: self,
            same,
            pending: None,
        }
    }
}

impl<I: Iterator> GroupingExt for I {}
