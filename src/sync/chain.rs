/// Source of the sub-sequences a [`Chain`] flattens.
pub trait Produce {
    type Item;
    type Error;
    type Seq: Iterator<Item = Result<Self::Item, Self::Error>>;

    /// Next sub-sequence to drain, or `None` when there are no more.
    ///
    /// May block on remote calls.
    fn produce_next(&mut self) -> Result<Option<Self::Seq>, Self::Error>;
}

/// Flattens the sub-sequences of a [`Produce`] into one forward-only sequence.
///
/// Empty sub-sequences are skipped. Sub-sequences are only requested when the
/// previous one is exhausted. An error, whether from the producer or from a
/// sub-sequence, is yielded once and ends the chain.
pub struct Chain<P: Produce> {
    producer: P,
    current: Option<P::Seq>,
    peeked: Option<Result<P::Item, P::Error>>,
    finished: bool,
}

impl<P: Produce> Chain<P> {
    pub fn new(producer: P) -> Self {
        Self {
            producer,
            current: None,
            peeked: None,
            finished: false,
        }
    }

    /// Whether [`Iterator::next`] would return an element. Produces (and
    /// skips empty) sub-sequences as needed, nothing is consumed.
    pub fn has_next(&mut self) -> bool {
        if self.peeked.is_none() {
            self.peeked = self.advance();
        }
        self.peeked.is_some()
    }

    pub fn producer(&self) -> &P {
        &self.producer
    }

    fn advance(&mut self) -> Option<Result<P::Item, P::Error>> {
        loop {
            if self.finished {
                return None;
            }
            if let Some(seq) = self.current.as_mut() {
                match seq.next() {
                    Some(Ok(item)) => return Some(Ok(item)),
                    Some(Err(e)) => return Some(Err(self.finish(e))),
                    None => self.current = None,
                }
            }
            match self.producer.produce_next() {
                Ok(Some(seq)) => self.current = Some(seq),
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => return Some(Err(self.finish(e))),
            }
        }
    }

    fn finish(&mut self, e: P::Error) -> P::Error {
        self.finished = true;
        self.current = None;
        e
    }
}

impl<P: Produce> Iterator for Chain<P> {
    type Item = Result<P::Item, P::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.peeked.take() {
            Some(item) => Some(item),
            None => self.advance(),
        }
    }
}
