//! Keyword-argument manager.
//!
//! [`KwargsManager`] has two responsibilities:
//!
//! 1. translate configurations between the structured form handed to the
//!    heuristic and the dummy-encoded numeric vectors used by the surrogate;
//! 2. draw random configurations from the current value domains.
//!
//! Categorical parameters are dummy encoded, one 0/1 position per option.
//! Single-choice groups (tuples) are one-hot; multi-choice groups (lists of
//! string or boolean labels) are independent toggles.

use rand::Rng;
use serde_json::Value;

use rtt_types::{
    CategoryPartition, ConfigError, Configuration, DomainReport, DomainSpec, RawDomain,
    TunedDomains,
};

use crate::attribute::{Attribute, CategoricalAttribute, NumAttribute};

/// Ordered attribute sequence. The order fixes the encoded-vector layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KwargsManager {
    attributes: Vec<Attribute>,
}

impl KwargsManager {
    /// Build the attribute sequence from a domain specification.
    pub fn fit(spec: &DomainSpec) -> Result<Self, ConfigError> {
        let mut attributes = Vec::new();
        for (name, domain) in spec.iter() {
            match domain {
                RawDomain::Tuple(labels) => {
                    if labels.is_empty() {
                        return Err(ConfigError::EmptyDomain { name: name.into() });
                    }
                    attributes.extend(labels.iter().map(|label| {
                        Attribute::Categorical(CategoricalAttribute::new(name, label.clone(), false))
                    }));
                }
                RawDomain::List(items) => attributes.extend(list_attributes(name, items)?),
                RawDomain::Set(_) | RawDomain::Scalar(_) => {
                    return Err(ConfigError::UnsupportedDomain { name: name.into() });
                }
            }
        }
        Ok(Self { attributes })
    }

    /// Wrap a hand-built attribute sequence.
    ///
    /// Options of one single-choice group must be contiguous.
    pub fn from_attributes(attributes: Vec<Attribute>) -> Result<Self, ConfigError> {
        let mut closed: Vec<&str> = Vec::new();
        let mut open: Option<&str> = None;
        for attr in &attributes {
            let current = attr.is_single_choice().then(|| attr.name());
            if current != open {
                if let Some(finished) = open {
                    closed.push(finished);
                }
                if let Some(name) = current {
                    if closed.contains(&name) {
                        return Err(ConfigError::NonContiguousGroup { name: name.into() });
                    }
                }
                open = current;
            }
        }
        Ok(Self { attributes })
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut [Attribute] {
        &mut self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Column names of the encoded vector.
    pub fn dummy_names(&self) -> Vec<String> {
        self.attributes.iter().map(Attribute::dummy_name).collect()
    }

    /// Draw one random configuration in encoded form.
    pub fn random_instance<R: Rng>(&self, rng: &mut R) -> Vec<f64> {
        let draws: Vec<f64> = self.attributes.iter().map(|_| rng.random::<f64>()).collect();
        self.encode_draws(&draws)
    }

    /// Turn one unit draw per attribute into an encoded vector.
    ///
    /// Numeric attributes scale the draw onto their range, multi-choice
    /// options round it, and each single-choice group keeps a 1 only on the
    /// option with the strictly highest draw (first seen wins ties).
    pub(crate) fn encode_draws(&self, draws: &[f64]) -> Vec<f64> {
        let mut values = Vec::with_capacity(self.attributes.len());
        let mut group: Option<(&str, f64, usize)> = None;

        for (aid, (attr, &draw)) in self.attributes.iter().zip(draws).enumerate() {
            match attr {
                Attribute::Num(num) => values.push(num.scale(draw)),
                Attribute::Categorical(cat) if cat.multi => values.push(draw.round()),
                Attribute::Categorical(cat) => match group {
                    Some((name, best, best_id)) if name == cat.name => {
                        if best < draw {
                            values[best_id] = 0.0;
                            group = Some((&cat.name, draw, aid));
                            values.push(1.0);
                        } else {
                            values.push(0.0);
                        }
                    }
                    _ => {
                        group = Some((&cat.name, draw, aid));
                        values.push(1.0);
                    }
                },
            }
        }
        values
    }

    /// Translate an encoded vector back into a configuration.
    ///
    /// Multi-choice parameters always appear, as a (possibly empty) list.
    /// A single-choice parameter with no encoded 1 is left out.
    pub fn dummy_to_kwargs(&self, encoded: &[f64]) -> Result<Configuration, ConfigError> {
        if encoded.len() != self.attributes.len() {
            return Err(ConfigError::EncodedLengthMismatch {
                expected: self.attributes.len(),
                got: encoded.len(),
            });
        }

        let mut kwargs = Configuration::new();
        for (attr, &value) in self.attributes.iter().zip(encoded) {
            match attr {
                Attribute::Num(num) => {
                    kwargs.insert(num.name.clone(), Value::from(value));
                }
                Attribute::Categorical(cat) if cat.multi => {
                    let entry = kwargs
                        .entry(cat.name.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if value == 1.0 {
                        if let Value::Array(selected) = entry {
                            selected.push(cat.category.clone());
                        }
                    }
                }
                Attribute::Categorical(cat) => {
                    if value == 1.0 {
                        kwargs.insert(cat.name.clone(), cat.category.clone());
                    }
                }
            }
        }
        Ok(kwargs)
    }

    /// Current domains: numeric ranges, and for categorical groups the
    /// partition of options by their tightened selection bounds.
    pub fn domains(&self) -> TunedDomains {
        let mut domains = TunedDomains::new();
        for attr in &self.attributes {
            match attr {
                Attribute::Num(num) => {
                    domains.insert(
                        num.name.clone(),
                        DomainReport::Numeric {
                            low: num.range.low,
                            high: num.range.high,
                        },
                    );
                }
                Attribute::Categorical(cat) => {
                    let report = domains
                        .entry(cat.name.clone())
                        .or_insert_with(|| DomainReport::Categorical(CategoryPartition::default()));
                    if let DomainReport::Categorical(partition) = report {
                        let label = cat.category.clone();
                        if cat.range.low >= 0.5 {
                            partition.included.push(label);
                        } else if cat.range.high <= 0.5 {
                            partition.excluded.push(label);
                        } else {
                            partition.undecided.push(label);
                        }
                    }
                }
            }
        }
        domains
    }
}

fn list_attributes(name: &str, items: &[Value]) -> Result<Vec<Attribute>, ConfigError> {
    let Some(first) = items.first() else {
        return Err(ConfigError::EmptyDomain { name: name.into() });
    };

    match first {
        Value::String(_) | Value::Bool(_) => {
            if !items.iter().all(|v| v.is_string() || v.is_boolean()) {
                return Err(ConfigError::UnsupportedCategoryType { name: name.into() });
            }
            Ok(items
                .iter()
                .map(|label| {
                    Attribute::Categorical(CategoricalAttribute::new(name, label.clone(), true))
                })
                .collect())
        }
        Value::Number(_) => {
            let bounds: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
            if bounds.len() != items.len() {
                return Err(ConfigError::UnsupportedCategoryType { name: name.into() });
            }
            let &[low, high] = bounds.as_slice() else {
                return Err(ConfigError::InvalidNumericRange {
                    name: name.into(),
                    reason: format!("expected [low, high], got {} values", bounds.len()),
                });
            };
            if low > high {
                return Err(ConfigError::InvalidNumericRange {
                    name: name.into(),
                    reason: format!("low ({low}) must not exceed high ({high})"),
                });
            }
            Ok(vec![Attribute::Num(NumAttribute::new(name, low, high))])
        }
        _ => Err(ConfigError::UnsupportedCategoryType { name: name.into() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use serde_json::json;

    fn mixed_spec() -> DomainSpec {
        DomainSpec::new()
            .numeric("x", 0.0, 10.0)
            .one_of("mode", ["a", "b", "c"])
            .any_of("ops", ["swap", "shift"])
            .numeric("temperature", 0.5, 2.0)
    }

    #[test]
    fn fit_builds_ordered_layout() {
        let man = KwargsManager::fit(&mixed_spec()).unwrap();
        assert_eq!(man.len(), 7);
        assert_eq!(
            man.dummy_names(),
            vec!["x", "a", "b", "c", "swap", "shift", "temperature"]
        );
        assert!(man.attributes()[1].is_single_choice());
        assert!(!man.attributes()[4].is_single_choice());
        assert!(!man.attributes()[4].is_numeric());
    }

    #[test]
    fn numeric_draws_respect_bounds() {
        let spec = DomainSpec::new()
            .numeric("a", -5.0, 5.0)
            .numeric("b", 100.0, 200.0)
            .numeric("c", 0.25, 0.25);
        let man = KwargsManager::fit(&spec).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(11);

        for _ in 0..1000 {
            let encoded = man.random_instance(&mut rng);
            for (attr, v) in man.attributes().iter().zip(&encoded) {
                assert!(attr.range().contains(*v), "{} = {v}", attr.name());
            }
        }
    }

    #[test]
    fn single_choice_group_is_one_hot() {
        let man = KwargsManager::fit(&mixed_spec()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(5);

        for _ in 0..500 {
            let encoded = man.random_instance(&mut rng);
            let ones = encoded[1..4].iter().filter(|v| **v == 1.0).count();
            assert_eq!(ones, 1);
            assert!(encoded[1..4].iter().all(|v| *v == 0.0 || *v == 1.0));
            assert!(encoded[4..6].iter().all(|v| *v == 0.0 || *v == 1.0));
        }
    }

    #[test]
    fn single_choice_first_maximum_wins_ties() {
        let spec = DomainSpec::new().one_of("mode", ["a", "b", "c"]);
        let man = KwargsManager::fit(&spec).unwrap();

        assert_eq!(man.encode_draws(&[0.7, 0.7, 0.2]), vec![1.0, 0.0, 0.0]);
        assert_eq!(man.encode_draws(&[0.1, 0.4, 0.9]), vec![0.0, 0.0, 1.0]);
        assert_eq!(man.encode_draws(&[0.3, 0.8, 0.8]), vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn adjacent_single_choice_groups_are_independent() {
        let spec = DomainSpec::new()
            .one_of("first", ["a", "b"])
            .one_of("second", ["c", "d"]);
        let man = KwargsManager::fit(&spec).unwrap();

        assert_eq!(man.encode_draws(&[0.9, 0.1, 0.2, 0.3]), vec![1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn multi_choice_rounds_draws() {
        let spec = DomainSpec::new().any_of("flags", [json!(true), json!(false)]);
        let man = KwargsManager::fit(&spec).unwrap();
        assert_eq!(man.encode_draws(&[0.2, 0.8]), vec![0.0, 1.0]);
    }

    #[test]
    fn decoded_instances_satisfy_domain() {
        let man = KwargsManager::fit(&mixed_spec()).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(3);

        for _ in 0..200 {
            let kwargs = man.dummy_to_kwargs(&man.random_instance(&mut rng)).unwrap();

            let x = kwargs["x"].as_f64().unwrap();
            assert!((0.0..=10.0).contains(&x));
            let t = kwargs["temperature"].as_f64().unwrap();
            assert!((0.5..=2.0).contains(&t));

            let mode = kwargs["mode"].as_str().unwrap();
            assert!(["a", "b", "c"].contains(&mode));

            let ops = kwargs["ops"].as_array().unwrap();
            assert!(ops.len() <= 2);
            for op in ops {
                assert!(["swap", "shift"].contains(&op.as_str().unwrap()));
            }
        }
    }

    #[test]
    fn multi_choice_defaults_to_empty_list() {
        let man = KwargsManager::fit(&mixed_spec()).unwrap();
        let kwargs = man
            .dummy_to_kwargs(&[4.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0])
            .unwrap();

        assert_eq!(kwargs["x"], json!(4.0));
        assert_eq!(kwargs["mode"], json!("b"));
        assert_eq!(kwargs["ops"], json!([]));
    }

    #[test]
    fn single_choice_without_selection_is_omitted() {
        let man = KwargsManager::fit(&mixed_spec()).unwrap();
        let kwargs = man
            .dummy_to_kwargs(&[4.0, 0.0, 0.0, 0.0, 1.0, 0.0, 1.0])
            .unwrap();

        assert!(!kwargs.contains_key("mode"));
        assert_eq!(kwargs["ops"], json!(["swap"]));
        assert_eq!(kwargs.len(), 3);
    }

    #[test]
    fn decode_rejects_wrong_length() {
        let man = KwargsManager::fit(&mixed_spec()).unwrap();
        let err = man.dummy_to_kwargs(&[1.0, 0.0, 1.0]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::EncodedLengthMismatch {
                expected: 7,
                got: 3
            }
        );
    }

    #[test]
    fn set_domain_is_rejected() {
        let spec = DomainSpec::new().with("y", RawDomain::Set(vec![json!(1), json!(2), json!(3)]));
        let err = KwargsManager::fit(&spec).unwrap_err();
        assert_eq!(err, ConfigError::UnsupportedDomain { name: "y".into() });

        let spec = DomainSpec::new().with("z", RawDomain::Scalar(json!(4)));
        assert!(matches!(
            KwargsManager::fit(&spec),
            Err(ConfigError::UnsupportedDomain { .. })
        ));
    }

    #[test]
    fn unsupported_list_elements_are_rejected() {
        let mixed = DomainSpec::new().with("ops", RawDomain::List(vec![json!("swap"), json!(1)]));
        assert_eq!(
            KwargsManager::fit(&mixed).unwrap_err(),
            ConfigError::UnsupportedCategoryType { name: "ops".into() }
        );

        let nested = DomainSpec::new().with("ops", RawDomain::List(vec![json!({"a": 1})]));
        assert!(matches!(
            KwargsManager::fit(&nested),
            Err(ConfigError::UnsupportedCategoryType { .. })
        ));

        let numbers_then_text =
            DomainSpec::new().with("x", RawDomain::List(vec![json!(1.0), json!("b")]));
        assert!(matches!(
            KwargsManager::fit(&numbers_then_text),
            Err(ConfigError::UnsupportedCategoryType { .. })
        ));
    }

    #[test]
    fn malformed_numeric_ranges_are_rejected() {
        let three = DomainSpec::new().with("x", RawDomain::List(vec![json!(1), json!(2), json!(3)]));
        assert!(matches!(
            KwargsManager::fit(&three),
            Err(ConfigError::InvalidNumericRange { .. })
        ));

        let inverted = DomainSpec::new().numeric("x", 5.0, 1.0);
        assert!(matches!(
            KwargsManager::fit(&inverted),
            Err(ConfigError::InvalidNumericRange { .. })
        ));

        let empty = DomainSpec::new().with("x", RawDomain::List(vec![]));
        assert_eq!(
            KwargsManager::fit(&empty).unwrap_err(),
            ConfigError::EmptyDomain { name: "x".into() }
        );
    }

    #[test]
    fn domains_partition_categories() {
        let mut man = KwargsManager::fit(&mixed_spec()).unwrap();
        man.attributes_mut()[0].range_mut().low = 2.5;
        man.attributes_mut()[1].range_mut().low = 0.5;
        man.attributes_mut()[2].range_mut().high = 0.5;
        man.attributes_mut()[5].range_mut().high = 0.5;

        let domains = man.domains();
        assert_eq!(domains["x"], DomainReport::Numeric { low: 2.5, high: 10.0 });
        assert_eq!(
            domains["temperature"],
            DomainReport::Numeric { low: 0.5, high: 2.0 }
        );

        let mode = domains["mode"].as_categorical().unwrap();
        assert_eq!(mode.included, vec![json!("a")]);
        assert_eq!(mode.excluded, vec![json!("b")]);
        assert_eq!(mode.undecided, vec![json!("c")]);

        let ops = domains["ops"].as_categorical().unwrap();
        assert!(ops.included.is_empty());
        assert_eq!(ops.excluded, vec![json!("shift")]);
        assert_eq!(ops.undecided, vec![json!("swap")]);
    }

    #[test]
    fn non_contiguous_single_choice_group_is_rejected() {
        let attrs = vec![
            Attribute::Categorical(CategoricalAttribute::new("mode", json!("a"), false)),
            Attribute::Num(NumAttribute::new("x", 0.0, 1.0)),
            Attribute::Categorical(CategoricalAttribute::new("mode", json!("b"), false)),
        ];
        assert_eq!(
            KwargsManager::from_attributes(attrs).unwrap_err(),
            ConfigError::NonContiguousGroup { name: "mode".into() }
        );

        let attrs = vec![
            Attribute::Categorical(CategoricalAttribute::new("mode", json!("a"), false)),
            Attribute::Categorical(CategoricalAttribute::new("mode", json!("b"), false)),
            Attribute::Num(NumAttribute::new("x", 0.0, 1.0)),
        ];
        assert_eq!(KwargsManager::from_attributes(attrs).unwrap().len(), 3);
    }

    #[test]
    fn managers_do_not_share_attributes() {
        let first = KwargsManager::fit(&DomainSpec::new().numeric("x", 0.0, 1.0)).unwrap();
        let second = KwargsManager::fit(&DomainSpec::new().one_of("m", ["a"])).unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.dummy_names(), vec!["a"]);
    }
}
