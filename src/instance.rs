use std::rc::Rc;

use crate::{
	ir::{definition::DefId, expression::Expression},
	op::normalize::Normalizer,
};

/// Resolves instances of classes with a classifying field.
pub trait InstancePool {
	/// An instance of `class` whose classifying field is `classifier`, which is in weak-head normal form.
	fn find(&self, normalizer: &Normalizer, class: DefId, classifier: &Rc<Expression>) -> Option<Rc<Expression>>;
}

pub struct NoInstances;

impl InstancePool for NoInstances {
	fn find(&self, _: &Normalizer, _: DefId, _: &Rc<Expression>) -> Option<Rc<Expression>> { None }
}

#[derive(Clone, Default, Debug)]
pub struct SimpleInstancePool {
	entries: Vec<(DefId, Rc<Expression>, Rc<Expression>)>,
}

impl SimpleInstancePool {
	pub fn new() -> Self { Self::default() }

	pub fn add(&mut self, class: DefId, classifier: Rc<Expression>, instance: Rc<Expression>) {
		self.entries.push((class, classifier, instance));
	}
}

impl InstancePool for SimpleInstancePool {
	fn find(&self, normalizer: &Normalizer, class: DefId, classifier: &Rc<Expression>) -> Option<Rc<Expression>> {
		let classifier = normalizer.normalize(classifier);
		self.entries
			.iter()
			.find(|(candidate, key, _)| {
				normalizer.module.is_subclass(*candidate, class) && normalizer.normalize(key) == classifier
			})
			.map(|(_, _, instance)| instance.clone())
	}
}
