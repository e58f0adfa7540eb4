#![forbid(unsafe_code)]

//! Jobs produced by stored rules when a file lands in a container.

use crate::{ContainerFile, ContainerResolver, EnqueueRequest, FileInfo, Queue, QueueError};
use gq_core::{ContainerRef, FileRef, Gear, Job, Origin, Rule, RuleError, RuleFile};
use gq_storage::StoredRule;
use tracing::{debug, info};

fn rule_error(err: RuleError) -> QueueError {
    QueueError::invalid_key(err.message(), "rule")
}

fn rule_file(name: &str, info: &FileInfo) -> RuleFile {
    RuleFile {
        name: name.to_string(),
        kind: info.kind.clone(),
        measurements: info.measurements(),
    }
}

impl<R: ContainerResolver> Queue<R> {
    /// Stores a rule after checking its globs.
    pub fn rule_add(
        &mut self,
        container: Option<&ContainerRef>,
        rule: &Rule,
    ) -> Result<StoredRule, QueueError> {
        rule.validate().map_err(rule_error)?;
        let stored = self.store.rule_insert(container, rule)?;
        info!(rule = stored.seq, gear = %rule.gear, "added rule");
        Ok(stored)
    }

    /// Enqueues one job per rule that fires for `file`.
    ///
    /// Rules of the file's container and its ancestors come first, then the
    /// global ones. Every matching rule is resolved before anything is
    /// enqueued, so a broken rule enqueues nothing.
    pub fn create_jobs(
        &mut self,
        file: &FileRef,
        origin: Option<Origin>,
    ) -> Result<Vec<Job>, QueueError> {
        let info = self.resolver.file(file)?;
        let container = file.container();
        let mut files = self.resolver.container_files(&container)?;
        if !files.iter().any(|entry| entry.name == file.name) {
            files.push(ContainerFile {
                name: file.name.clone(),
                info: info.clone(),
            });
        }
        let subject = rule_file(&file.name, &info);
        let siblings: Vec<RuleFile> = files
            .iter()
            .map(|entry| rule_file(&entry.name, &entry.info))
            .collect();

        let mut scopes = vec![container.clone()];
        scopes.extend(self.resolver.ancestors(&container)?);

        let mut requests = Vec::new();
        for stored in self.store.rules_for(&scopes)? {
            if !stored.rule.eval(&subject, &siblings).map_err(rule_error)? {
                continue;
            }
            let gear = self
                .store
                .gear_get_by_name(&stored.rule.gear)?
                .ok_or_else(|| QueueError::NotFound(format!("gear {}", stored.rule.gear)))?;
            debug!(rule = stored.seq, gear = %gear.name, file = %file.name, "rule matched");
            requests.push(rule_request(&stored.rule, &gear, file, &container, &files)?);
        }

        let mut jobs = Vec::with_capacity(requests.len());
        for request in requests {
            jobs.push(self.enqueue(request, origin.clone(), None)?);
        }
        info!(container = %container, file = %file.name, jobs = jobs.len(), "rules evaluated");
        Ok(jobs)
    }
}

fn rule_request(
    rule: &Rule,
    gear: &Gear,
    file: &FileRef,
    container: &ContainerRef,
    files: &[ContainerFile],
) -> Result<EnqueueRequest, QueueError> {
    let mut request = EnqueueRequest::new(gear.id.clone());
    let Some(by_type) = rule.inputs.as_ref() else {
        let mut names = gear.manifest.inputs.keys();
        let (Some(name), None) = (names.next(), names.next()) else {
            return Err(QueueError::invalid_key(
                format!(
                    "rule for gear {} has no match map and the gear does not take exactly one input",
                    gear.name
                ),
                "match",
            ));
        };
        request.inputs.insert(name.clone(), file.clone());
        return Ok(request);
    };

    for (input_name, kind) in by_type {
        let Some(found) = files
            .iter()
            .find(|entry| entry.info.kind.as_deref() == Some(kind.as_str()))
        else {
            return Err(QueueError::invalid_key(
                format!("no file of type {kind} in {container} for rule gear {}", gear.name),
                input_name.clone(),
            ));
        };
        request.inputs.insert(
            input_name.clone(),
            FileRef::new(container.kind, container.id.clone(), found.name.clone()),
        );
    }
    Ok(request)
}
