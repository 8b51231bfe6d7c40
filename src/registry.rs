/*!
Project assignments: one student, one supervisor, at most one examiner.
*/
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::err::{Referent, ValidationError};
use crate::identity::IdentityStore;
use crate::models::{Project, ProjectId, Role, UserId};

/// What happened to the projects of a deleted user.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
pub struct Cascade {
    pub removed: Vec<ProjectId>,
    pub examiner_cleared: Vec<ProjectId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRegistry {
    projects: BTreeMap<ProjectId, Project>,
    next_project_id: u64,
}

impl Default for AssignmentRegistry {
    fn default() -> Self {
        AssignmentRegistry {
            projects: BTreeMap::new(),
            next_project_id: 1,
        }
    }
}

impl AssignmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /**
    Assigns a titled project to a student under a supervisor.

    Checks run in order: every field present, the student not already
    assigned, then both ids resolving to users with the right role.
    */
    pub fn create_project(
        &mut self,
        users: &IdentityStore,
        title: &str,
        student_id: Option<UserId>,
        supervisor_id: Option<UserId>,
    ) -> Result<Project, ValidationError> {
        log::trace!(
            "AssignmentRegistry::create_project( {:?}, {:?}, {:?} ) called.",
            title,
            student_id,
            supervisor_id
        );

        let title = title.trim();
        if title.is_empty() {
            return Err(ValidationError::MissingField { field: "title" });
        }
        let student_id = student_id.ok_or(ValidationError::MissingField { field: "student_id" })?;
        let supervisor_id =
            supervisor_id.ok_or(ValidationError::MissingField { field: "supervisor_id" })?;

        if self.project_for_student(student_id).is_some() {
            return Err(ValidationError::AlreadyAssigned { student_id });
        }
        if users.resolve(student_id, Role::Student).is_none() {
            return Err(ValidationError::UnknownReference(Referent::Student(student_id)));
        }
        if users.resolve(supervisor_id, Role::Supervisor).is_none() {
            return Err(ValidationError::UnknownReference(Referent::Supervisor(
                supervisor_id,
            )));
        }

        let project = Project {
            id: ProjectId(self.next_project_id),
            title: title.to_string(),
            student_id,
            supervisor_id,
            examiner_id: None,
        };
        self.next_project_id += 1;
        self.projects.insert(project.id, project.clone());

        log::info!(
            "Project {} {:?} assigned to student {} under supervisor {}.",
            project.id,
            &project.title,
            student_id,
            supervisor_id
        );
        Ok(project)
    }

    pub fn delete_project(&mut self, id: ProjectId) -> Option<Project> {
        let removed = self.projects.remove(&id);
        match &removed {
            Some(p) => log::info!("Project {} {:?} deleted.", p.id, &p.title),
            None => log::debug!("No project {} to delete.", id),
        }
        removed
    }

    pub fn assign_examiner(
        &mut self,
        users: &IdentityStore,
        project_id: ProjectId,
        examiner_id: UserId,
    ) -> Result<(), ValidationError> {
        log::trace!(
            "AssignmentRegistry::assign_examiner( {}, {} ) called.",
            project_id,
            examiner_id
        );

        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or(ValidationError::UnknownReference(Referent::Project(project_id)))?;
        if project.supervisor_id == examiner_id {
            return Err(ValidationError::ExaminerIsSupervisor { examiner_id });
        }
        if users.resolve(examiner_id, Role::Supervisor).is_none() {
            return Err(ValidationError::UnknownReference(Referent::Supervisor(
                examiner_id,
            )));
        }

        project.examiner_id = Some(examiner_id);
        log::info!("Supervisor {} now examines project {}.", examiner_id, project_id);
        Ok(())
    }

    pub fn unassign_examiner(&mut self, project_id: ProjectId) -> Result<(), ValidationError> {
        let project = self
            .projects
            .get_mut(&project_id)
            .ok_or(ValidationError::UnknownReference(Referent::Project(project_id)))?;
        if let Some(examiner_id) = project.examiner_id.take() {
            log::info!("Supervisor {} no longer examines project {}.", examiner_id, project_id);
        }
        Ok(())
    }

    /**
    Drops every trace of a deleted user. Projects they study or supervise
    go away entirely; projects they only examine lose their examiner.
    */
    pub fn purge_user(&mut self, user_id: UserId) -> Cascade {
        let mut cascade = Cascade::default();

        self.projects.retain(|id, p| {
            let keep = p.student_id != user_id && p.supervisor_id != user_id;
            if !keep {
                cascade.removed.push(*id);
            }
            keep
        });
        for project in self.projects.values_mut() {
            if project.examiner_id == Some(user_id) {
                project.examiner_id = None;
                cascade.examiner_cleared.push(project.id);
            }
        }

        if !cascade.removed.is_empty() || !cascade.examiner_cleared.is_empty() {
            log::info!(
                "Deleting user {} removed projects {:?} and cleared examiner on {:?}.",
                user_id,
                &cascade.removed,
                &cascade.examiner_cleared
            );
        }
        cascade
    }

    pub fn project(&self, id: ProjectId) -> Option<&Project> {
        self.projects.get(&id)
    }

    pub fn projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.values()
    }

    pub fn project_for_student(&self, student_id: UserId) -> Option<&Project> {
        self.projects.values().find(|p| p.student_id == student_id)
    }

    pub fn supervised_by(&self, supervisor_id: UserId) -> impl Iterator<Item = &Project> {
        self.projects
            .values()
            .filter(move |p| p.supervisor_id == supervisor_id)
    }

    pub fn examined_by(&self, examiner_id: UserId) -> impl Iterator<Item = &Project> {
        self.projects
            .values()
            .filter(move |p| p.examiner_id == Some(examiner_id))
    }

    pub fn len(&self) -> usize {
        self.projects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewUser;

    fn add(ids: &mut IdentityStore, name: &str, username: &str, role: Role) -> UserId {
        ids.create_user(NewUser {
            name: name.to_string(),
            username: username.to_string(),
            email: format!("{}@uni.edu", username),
            password: "password".to_string(),
            role,
        })
        .unwrap()
        .id
    }

    /// Alice(1) Student, Zaini(2) Supervisor, Ben(3) Student, Azman(4) Supervisor.
    fn people() -> IdentityStore {
        let mut ids = IdentityStore::new("admin", "admin").unwrap();
        add(&mut ids, "Alice Smith", "asmith", Role::Student);
        add(&mut ids, "Dr. Zaini", "zaini", Role::Supervisor);
        add(&mut ids, "Ben Lee", "blee", Role::Student);
        add(&mut ids, "Prof. Azman", "azman", Role::Supervisor);
        ids
    }

    #[test]
    fn create_project_starts_without_examiner() {
        let ids = people();
        let mut reg = AssignmentRegistry::new();
        let p = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();
        assert_eq!(p.student_id, UserId(1));
        assert_eq!(p.supervisor_id, UserId(2));
        assert_eq!(p.examiner_id, None);
        assert_eq!(reg.project(p.id), Some(&p));
    }

    #[test]
    fn one_project_per_student() {
        let ids = people();
        let mut reg = AssignmentRegistry::new();
        let first = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();
        let err = reg
            .create_project(&ids, "Something Else", Some(UserId(1)), Some(UserId(4)))
            .unwrap_err();
        assert_eq!(err, ValidationError::AlreadyAssigned { student_id: UserId(1) });
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.project(first.id), Some(&first));
    }

    #[test]
    fn create_project_validation_order() {
        let ids = people();
        let mut reg = AssignmentRegistry::new();
        assert_eq!(
            reg.create_project(&ids, "   ", Some(UserId(1)), Some(UserId(2))),
            Err(ValidationError::MissingField { field: "title" })
        );
        assert_eq!(
            reg.create_project(&ids, "T", None, Some(UserId(2))),
            Err(ValidationError::MissingField { field: "student_id" })
        );
        assert_eq!(
            reg.create_project(&ids, "T", Some(UserId(1)), None),
            Err(ValidationError::MissingField { field: "supervisor_id" })
        );
        // Roles swapped.
        assert_eq!(
            reg.create_project(&ids, "T", Some(UserId(2)), Some(UserId(1))),
            Err(ValidationError::UnknownReference(Referent::Student(UserId(2))))
        );
        assert_eq!(
            reg.create_project(&ids, "T", Some(UserId(1)), Some(UserId(99))),
            Err(ValidationError::UnknownReference(Referent::Supervisor(UserId(99))))
        );
        assert!(reg.is_empty());
    }

    #[test]
    fn examiner_must_not_be_supervisor() {
        let ids = people();
        let mut reg = AssignmentRegistry::new();
        let p = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();

        assert_eq!(
            reg.assign_examiner(&ids, p.id, UserId(2)),
            Err(ValidationError::ExaminerIsSupervisor { examiner_id: UserId(2) })
        );
        assert_eq!(reg.project(p.id).unwrap().examiner_id, None);

        reg.assign_examiner(&ids, p.id, UserId(4)).unwrap();
        assert_eq!(
            reg.assign_examiner(&ids, p.id, UserId(2)),
            Err(ValidationError::ExaminerIsSupervisor { examiner_id: UserId(2) })
        );
        assert_eq!(reg.project(p.id).unwrap().examiner_id, Some(UserId(4)));
    }

    #[test]
    fn examiner_must_be_a_supervisor() {
        let ids = people();
        let mut reg = AssignmentRegistry::new();
        let p = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();
        assert_eq!(
            reg.assign_examiner(&ids, p.id, UserId(3)),
            Err(ValidationError::UnknownReference(Referent::Supervisor(UserId(3))))
        );
        assert_eq!(
            reg.assign_examiner(&ids, ProjectId(42), UserId(4)),
            Err(ValidationError::UnknownReference(Referent::Project(ProjectId(42))))
        );
    }

    #[test]
    fn examiner_can_be_reassigned_and_cleared() {
        let mut ids = people();
        let chan = add(&mut ids, "Dr. Chan", "chan", Role::Supervisor);
        let mut reg = AssignmentRegistry::new();
        let p = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();

        reg.assign_examiner(&ids, p.id, UserId(4)).unwrap();
        reg.assign_examiner(&ids, p.id, chan).unwrap();
        assert_eq!(reg.project(p.id).unwrap().examiner_id, Some(chan));
        assert_eq!(reg.examined_by(chan).count(), 1);
        assert_eq!(reg.examined_by(UserId(4)).count(), 0);

        reg.unassign_examiner(p.id).unwrap();
        assert_eq!(reg.project(p.id).unwrap().examiner_id, None);
    }

    #[test]
    fn purge_user_cascades() {
        let ids = people();
        let mut reg = AssignmentRegistry::new();
        let alice = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();
        let ben = reg
            .create_project(&ids, "Smart Farming", Some(UserId(3)), Some(UserId(4)))
            .unwrap();
        reg.assign_examiner(&ids, ben.id, UserId(2)).unwrap();

        let cascade = reg.purge_user(UserId(2));
        assert_eq!(cascade.removed, vec![alice.id]);
        assert_eq!(cascade.examiner_cleared, vec![ben.id]);
        assert!(reg.project(alice.id).is_none());
        assert_eq!(reg.project(ben.id).unwrap().examiner_id, None);

        let cascade = reg.purge_user(UserId(3));
        assert_eq!(cascade.removed, vec![ben.id]);
        assert!(reg.projects().all(|p| p.student_id != UserId(3)));
        assert!(reg.is_empty());
    }

    #[test]
    fn project_ids_are_not_reused() {
        let ids = people();
        let mut reg = AssignmentRegistry::new();
        let first = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();
        assert!(reg.delete_project(first.id).is_some());
        assert!(reg.delete_project(first.id).is_none());
        let second = reg
            .create_project(&ids, "Neural Nets", Some(UserId(1)), Some(UserId(2)))
            .unwrap();
        assert_eq!(second.id, ProjectId(2));
    }
}
