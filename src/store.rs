/*!
The portal's whole state: who can log in, and who works on which project.

Every mutating operation takes the acting [`Identity`] and runs it past the
[`gate`](crate::gate) before touching anything.
*/
use serde::{Deserialize, Serialize};

use crate::err::{PortalError, Referent, ValidationError};
use crate::gate::{self, Action, Capability};
use crate::identity::IdentityStore;
use crate::models::{
    Contact, Identity, NewUser, Project, ProjectId, ProjectView, Role, UserId, UserSummary,
};
use crate::registry::{AssignmentRegistry, Cascade};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Progress,
    Logbook,
}

impl ReportKind {
    pub fn capability(self) -> Capability {
        match self {
            ReportKind::Progress => Capability::ProgressReportSubmission,
            ReportKind::Logbook => Capability::LogbookReportSubmission,
        }
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "progress" => Ok(ReportKind::Progress),
            "logbook" => Ok(ReportKind::Logbook),
            _ => Err(format!("{:?} is not a report kind.", s)),
        }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "role")]
pub enum Dashboard {
    Admin {
        projects: usize,
        supervisors: usize,
        students: usize,
    },
    Supervisor {
        supervised: usize,
        to_examine: usize,
        supervisors: usize,
    },
    Student {
        has_project: bool,
        supervisors: usize,
    },
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct SupervisorPanel {
    pub supervised: Vec<ProjectView>,
    pub examined: Vec<ProjectView>,
}

/// The projects a report of some kind can be filed against, from the
/// point of view of whoever is asking.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
#[serde(tag = "role")]
pub enum ReportContext {
    Student {
        kind: ReportKind,
        project: Option<ProjectView>,
    },
    Supervisor {
        kind: ReportKind,
        projects: Vec<ProjectView>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portal {
    identities: IdentityStore,
    registry: AssignmentRegistry,
}

impl Portal {
    /// A portal holding nothing but the admin login.
    pub fn new(admin_username: &str, admin_password: &str) -> Result<Portal, PortalError> {
        Ok(Portal {
            identities: IdentityStore::new(admin_username, admin_password)?,
            registry: AssignmentRegistry::new(),
        })
    }

    /**
    A portal populated with the demonstration users and projects:

    | id | name        | username | role       |
    |----|-------------|----------|------------|
    | 1  | Alice Smith | asmith   | Student    |
    | 2  | Dr. Zaini   | zaini    | Supervisor |
    | 3  | Ben Lee     | blee     | Student    |
    | 4  | Prof. Azman | azman    | Supervisor |
    | 5  | Dr. Chan    | chan     | Supervisor |
    */
    pub fn seeded(admin_username: &str, admin_password: &str) -> Result<Portal, PortalError> {
        let mut portal = Portal::new(admin_username, admin_password)?;

        let seed_users = [
            ("Alice Smith", "asmith", "alice.s@uni.edu", "password123", Role::Student),
            ("Dr. Zaini", "zaini", "zaini.d@uni.edu", "securepass", Role::Supervisor),
            ("Ben Lee", "blee", "ben.l@uni.edu", "benpass", Role::Student),
            ("Prof. Azman", "azman", "azman.p@uni.edu", "profpass", Role::Supervisor),
            ("Dr. Chan", "chan", "chan.d@uni.edu", "chanpass", Role::Supervisor),
        ];
        for (name, username, email, password, role) in seed_users {
            portal.identities.create_user(NewUser {
                name: name.to_string(),
                username: username.to_string(),
                email: email.to_string(),
                password: password.to_string(),
                role,
            })?;
        }

        let seed_projects = [
            ("Optimizing Neural Network Training", 1, 2),
            ("IoT-based Smart Farming System", 3, 4),
        ];
        for (title, student, supervisor) in seed_projects {
            portal.registry.create_project(
                &portal.identities,
                title,
                Some(UserId(student)),
                Some(UserId(supervisor)),
            )?;
        }

        log::info!(
            "Seeded portal with {} users and {} projects.",
            portal.identities.len(),
            portal.registry.len()
        );
        Ok(portal)
    }

    pub fn authenticate(
        &self,
        role: Role,
        username: &str,
        password: &str,
    ) -> Result<Identity, PortalError> {
        self.identities
            .authenticate(role, username, password)
            .map_err(|e| {
                log::warn!("Failed {} login for {:?}.", role, username);
                PortalError::from(e)
            })
    }

    pub fn identity_of(&self, id: UserId) -> Option<Identity> {
        self.identities.identity_of(id)
    }

    pub fn create_user(
        &mut self,
        actor: &Identity,
        fields: NewUser,
    ) -> Result<UserSummary, PortalError> {
        gate::authorize(actor, Action::CreateUser)?;
        let user = self.identities.create_user(fields)?;
        Ok(UserSummary::from(&user))
    }

    /// Deletes a user along with the projects that cannot outlive them.
    /// `None` when there was no such user, the admin included.
    pub fn delete_user(
        &mut self,
        actor: &Identity,
        id: UserId,
    ) -> Result<Option<Cascade>, PortalError> {
        gate::authorize(actor, Action::DeleteUser)?;
        Ok(self
            .identities
            .remove_user(id)
            .map(|_| self.registry.purge_user(id)))
    }

    pub fn change_admin_password(
        &mut self,
        actor: &Identity,
        old: &str,
        new: &str,
        confirm: &str,
    ) -> Result<(), PortalError> {
        gate::authorize(actor, Action::ChangeAdminPassword)?;
        self.identities.change_admin_password(old, new, confirm)
    }

    pub fn create_project(
        &mut self,
        actor: &Identity,
        title: &str,
        student_id: Option<UserId>,
        supervisor_id: Option<UserId>,
    ) -> Result<ProjectView, PortalError> {
        gate::authorize(actor, Action::CreateProject)?;
        let project =
            self.registry
                .create_project(&self.identities, title, student_id, supervisor_id)?;
        Ok(self.view(&project))
    }

    pub fn delete_project(&mut self, actor: &Identity, id: ProjectId) -> Result<(), PortalError> {
        gate::authorize(actor, Action::DeleteProject)?;
        self.registry.delete_project(id);
        Ok(())
    }

    pub fn assign_examiner(
        &mut self,
        actor: &Identity,
        project_id: ProjectId,
        examiner_id: UserId,
    ) -> Result<ProjectView, PortalError> {
        gate::authorize(actor, Action::AssignExaminer)?;
        self.registry
            .assign_examiner(&self.identities, project_id, examiner_id)?;
        self.project_view(project_id)
    }

    pub fn unassign_examiner(
        &mut self,
        actor: &Identity,
        project_id: ProjectId,
    ) -> Result<ProjectView, PortalError> {
        gate::authorize(actor, Action::UnassignExaminer)?;
        self.registry.unassign_examiner(project_id)?;
        self.project_view(project_id)
    }

    pub fn users(&self, actor: &Identity) -> Result<Vec<UserSummary>, PortalError> {
        gate::require(actor, Capability::UserManagement)?;
        Ok(self.identities.users().map(UserSummary::from).collect())
    }

    /// Listed from either of the two admin views that work on projects.
    pub fn projects(&self, actor: &Identity) -> Result<Vec<ProjectView>, PortalError> {
        if gate::require(actor, Capability::ExaminerAssignment).is_err() {
            gate::require(actor, Capability::ProjectAssignment)?;
        }
        Ok(self.registry.projects().map(|p| self.view(p)).collect())
    }

    pub fn dashboard(&self, actor: &Identity) -> Result<Dashboard, PortalError> {
        gate::require(actor, Capability::Dashboard)?;

        let supervisors = self.identities.users_with_role(Role::Supervisor).count();
        let dash = match actor.role {
            Role::Admin => Dashboard::Admin {
                projects: self.registry.len(),
                supervisors,
                students: self.identities.users_with_role(Role::Student).count(),
            },
            Role::Supervisor => Dashboard::Supervisor {
                supervised: self.registry.supervised_by(actor.id).count(),
                to_examine: self.registry.examined_by(actor.id).count(),
                supervisors,
            },
            Role::Student => Dashboard::Student {
                has_project: self.registry.project_for_student(actor.id).is_some(),
                supervisors,
            },
        };
        Ok(dash)
    }

    pub fn supervisor_panel(&self, actor: &Identity) -> Result<SupervisorPanel, PortalError> {
        gate::require(actor, Capability::SupervisorPanel)?;
        Ok(SupervisorPanel {
            supervised: self
                .registry
                .supervised_by(actor.id)
                .map(|p| self.view(p))
                .collect(),
            examined: self
                .registry
                .examined_by(actor.id)
                .map(|p| self.view(p))
                .collect(),
        })
    }

    pub fn report_context(
        &self,
        actor: &Identity,
        kind: ReportKind,
    ) -> Result<ReportContext, PortalError> {
        gate::require(actor, kind.capability())?;
        let ctx = match actor.role {
            Role::Student => ReportContext::Student {
                kind,
                project: self
                    .registry
                    .project_for_student(actor.id)
                    .map(|p| self.view(p)),
            },
            Role::Supervisor => ReportContext::Supervisor {
                kind,
                projects: self
                    .registry
                    .supervised_by(actor.id)
                    .map(|p| self.view(p))
                    .collect(),
            },
            // The capability table keeps admins out above.
            Role::Admin => {
                return Err(crate::err::AuthError::NotVisible {
                    role: actor.role,
                    capability: kind.capability(),
                }
                .into())
            }
        };
        Ok(ctx)
    }

    fn project_view(&self, id: ProjectId) -> Result<ProjectView, PortalError> {
        self.registry
            .project(id)
            .map(|p| self.view(p))
            .ok_or_else(|| ValidationError::UnknownReference(Referent::Project(id)).into())
    }

    fn view(&self, project: &Project) -> ProjectView {
        let contact = |id: UserId| self.identities.user(id).map(Contact::from);
        ProjectView {
            id: project.id,
            title: project.title.clone(),
            student: contact(project.student_id),
            supervisor: contact(project.supervisor_id),
            examiner: project.examiner_id.and_then(contact),
        }
    }

    pub fn identities(&self) -> &IdentityStore {
        &self.identities
    }

    pub fn registry(&self) -> &AssignmentRegistry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::AuthError;
    use crate::models::ADMIN_ID;
    use crate::tests::ensure_logging;

    fn admin(portal: &Portal) -> Identity {
        portal.authenticate(Role::Admin, "admin", "admin").unwrap()
    }

    fn chan() -> NewUser {
        NewUser {
            name: "Dr. Chan".to_string(),
            username: "chan".to_string(),
            email: "chan.d@uni.edu".to_string(),
            password: "chanpass".to_string(),
            role: Role::Supervisor,
        }
    }

    #[test]
    fn seeded_portal() {
        let portal = Portal::seeded("admin", "admin").unwrap();
        assert_eq!(portal.identities().len(), 5);
        assert_eq!(portal.registry().len(), 2);
        let zaini = portal
            .authenticate(Role::Supervisor, "zaini", "securepass")
            .unwrap();
        assert_eq!(zaini.id, UserId(2));
    }

    #[test]
    fn assignment_walkthrough() {
        ensure_logging();
        let mut portal = Portal::new("admin", "admin").unwrap();
        let root = admin(&portal);

        let alice = portal
            .create_user(
                &root,
                NewUser {
                    name: "Alice".to_string(),
                    username: "alice".to_string(),
                    email: "alice@uni.edu".to_string(),
                    password: "password123".to_string(),
                    role: Role::Student,
                },
            )
            .unwrap();
        let zaini = portal
            .create_user(
                &root,
                NewUser {
                    name: "Zaini".to_string(),
                    username: "zaini".to_string(),
                    email: "zaini@uni.edu".to_string(),
                    password: "securepass".to_string(),
                    role: Role::Supervisor,
                },
            )
            .unwrap();
        assert_eq!((alice.id, zaini.id), (UserId(1), UserId(2)));

        let project = portal
            .create_project(&root, "Neural Nets", Some(alice.id), Some(zaini.id))
            .unwrap();
        assert_eq!(project.student.as_ref().unwrap().id, alice.id);
        assert_eq!(project.supervisor.as_ref().unwrap().id, zaini.id);
        assert_eq!(project.examiner, None);

        match portal.assign_examiner(&root, project.id, zaini.id) {
            Err(PortalError::Validation(ValidationError::ExaminerIsSupervisor { .. })) => {}
            other => panic!("unexpected {:?}", other),
        }

        // Two ghost ids so that Chan lands on id 5.
        for username in ["x3", "x4"] {
            let mut ghost = chan();
            ghost.username = username.to_string();
            let g = portal.create_user(&root, ghost).unwrap();
            portal.delete_user(&root, g.id).unwrap();
        }
        let chan = portal.create_user(&root, chan()).unwrap();
        assert_eq!(chan.id, UserId(5));

        let project = portal.assign_examiner(&root, project.id, chan.id).unwrap();
        assert_eq!(project.examiner.unwrap().id, UserId(5));
    }

    #[test]
    fn mutations_are_gated_inside_the_store() {
        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let alice = portal
            .authenticate(Role::Student, "asmith", "password123")
            .unwrap();
        let zaini = portal
            .authenticate(Role::Supervisor, "zaini", "securepass")
            .unwrap();

        for actor in [&alice, &zaini] {
            assert!(matches!(
                portal.create_user(actor, chan()),
                Err(PortalError::Auth(AuthError::Forbidden { action: Action::CreateUser, .. }))
            ));
            assert!(matches!(
                portal.delete_user(actor, UserId(1)),
                Err(PortalError::Auth(AuthError::Forbidden { .. }))
            ));
            assert!(matches!(
                portal.delete_project(actor, ProjectId(1)),
                Err(PortalError::Auth(AuthError::Forbidden { .. }))
            ));
            assert!(matches!(
                portal.assign_examiner(actor, ProjectId(1), UserId(5)),
                Err(PortalError::Auth(AuthError::Forbidden { .. }))
            ));
            assert!(matches!(
                portal.change_admin_password(actor, "admin", "newpass123", "newpass123"),
                Err(PortalError::Auth(AuthError::Forbidden { .. }))
            ));
        }

        assert_eq!(portal.identities().len(), 5);
        assert_eq!(portal.registry().len(), 2);
        assert_eq!(portal.registry().project(ProjectId(1)).unwrap().examiner_id, None);
        assert!(portal.authenticate(Role::Admin, "admin", "admin").is_ok());
    }

    #[test]
    fn deleting_a_student_deletes_their_project() {
        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let root = admin(&portal);
        let cascade = portal.delete_user(&root, UserId(1)).unwrap().unwrap();
        assert_eq!(cascade.removed, vec![ProjectId(1)]);
        assert!(portal
            .registry()
            .projects()
            .all(|p| p.student_id != UserId(1)));
        assert!(portal
            .authenticate(Role::Student, "asmith", "password123")
            .is_err());
    }

    #[test]
    fn deleting_nobody_changes_nothing() {
        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let root = admin(&portal);
        assert!(portal.delete_user(&root, ADMIN_ID).unwrap().is_none());
        assert!(portal.delete_user(&root, UserId(42)).unwrap().is_none());
        assert_eq!(portal.identities().len(), 5);
        assert_eq!(portal.registry().len(), 2);
        assert!(portal.authenticate(Role::Admin, "admin", "admin").is_ok());
    }

    #[test]
    fn deleting_an_examiner_keeps_the_project() {
        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let root = admin(&portal);
        portal
            .assign_examiner(&root, ProjectId(2), UserId(5))
            .unwrap();
        let cascade = portal.delete_user(&root, UserId(5)).unwrap().unwrap();
        assert!(cascade.removed.is_empty());
        assert_eq!(cascade.examiner_cleared, vec![ProjectId(2)]);
        assert_eq!(portal.registry().len(), 2);
    }

    #[test]
    fn deleting_a_supervisor_deletes_their_projects() {
        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let root = admin(&portal);
        let before = portal.projects(&root).unwrap();
        assert_eq!(before.len(), 2);
        assert_eq!(before[0].student.as_ref().unwrap().name, "Alice Smith");

        portal.delete_user(&root, UserId(4)).unwrap().unwrap();
        let after = portal.projects(&root).unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, ProjectId(1));
        assert_eq!(after[0].supervisor.as_ref().unwrap().name, "Dr. Zaini");
    }

    #[test]
    fn dashboards_per_role() {
        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let root = admin(&portal);
        portal
            .assign_examiner(&root, ProjectId(1), UserId(4))
            .unwrap();

        assert_eq!(
            portal.dashboard(&root).unwrap(),
            Dashboard::Admin {
                projects: 2,
                supervisors: 3,
                students: 2,
            }
        );
        let azman = portal.authenticate(Role::Supervisor, "azman", "profpass").unwrap();
        assert_eq!(
            portal.dashboard(&azman).unwrap(),
            Dashboard::Supervisor {
                supervised: 1,
                to_examine: 1,
                supervisors: 3,
            }
        );
        let ben = portal.authenticate(Role::Student, "blee", "benpass").unwrap();
        assert_eq!(
            portal.dashboard(&ben).unwrap(),
            Dashboard::Student {
                has_project: true,
                supervisors: 3,
            }
        );
    }

    #[test]
    fn supervisor_panel_and_reports() {
        let mut portal = Portal::seeded("admin", "admin").unwrap();
        let root = admin(&portal);
        portal
            .assign_examiner(&root, ProjectId(1), UserId(4))
            .unwrap();

        let azman = portal.authenticate(Role::Supervisor, "azman", "profpass").unwrap();
        let panel = portal.supervisor_panel(&azman).unwrap();
        assert_eq!(panel.supervised.len(), 1);
        assert_eq!(panel.supervised[0].id, ProjectId(2));
        assert_eq!(panel.examined.len(), 1);
        assert_eq!(panel.examined[0].id, ProjectId(1));

        let alice = portal.authenticate(Role::Student, "asmith", "password123").unwrap();
        assert!(matches!(
            portal.supervisor_panel(&alice),
            Err(PortalError::Auth(AuthError::NotVisible { .. }))
        ));
        match portal.report_context(&alice, ReportKind::Progress).unwrap() {
            ReportContext::Student { project: Some(p), kind } => {
                assert_eq!(kind, ReportKind::Progress);
                assert_eq!(p.title, "Optimizing Neural Network Training");
            }
            other => panic!("unexpected {:?}", other),
        }
        match portal.report_context(&azman, ReportKind::Logbook).unwrap() {
            ReportContext::Supervisor { projects, .. } => assert_eq!(projects.len(), 1),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            portal.report_context(&root, ReportKind::Logbook),
            Err(PortalError::Auth(AuthError::NotVisible { .. }))
        ));
        assert!(matches!(
            portal.users(&alice),
            Err(PortalError::Auth(AuthError::NotVisible { .. }))
        ));
    }

    #[test]
    fn admin_password_change_through_portal() {
        let mut portal = Portal::new("admin", "admin").unwrap();
        let root = admin(&portal);
        portal
            .change_admin_password(&root, "admin", "newpass123", "newpass123")
            .unwrap();
        assert!(portal.authenticate(Role::Admin, "admin", "newpass123").is_ok());
        assert!(portal.authenticate(Role::Admin, "admin", "admin").is_err());
    }
}
